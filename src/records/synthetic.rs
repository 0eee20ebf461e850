use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;

use crate::records::source::{is_valid_user_id, ACTIONS_FILE, FEEDBACK_FILE, POSTS_FILE};
use crate::records::{
    ActionKind, ActionLogEvent, FeedbackEvent, PostCategory, PostRecord, Sentiment,
};

const DEFAULT_POST_COUNT: usize = 24;

const TITLES: [&str; 8] = [
    "朝のルーティン紹介",
    "新作コスメ徹底レビュー",
    "週末カフェ巡り",
    "3分でできる時短レシピまとめ",
    "撮影の裏側",
    "フォロワーさんからの質問に回答",
    "お気に入りアイテム",
    "旅行Vlog 京都編",
];

const HASHTAGS: [&str; 10] = [
    "#cafe", "#cosme", "#vlog", "#recipe", "#ootd", "#kyoto", "#morning", "#review", "#tips",
    "#travel",
];

const POSITIVE_COMMENTS: [&str; 4] = [
    "また見たい！",
    "参考になりました",
    "この構成はリピートしたい",
    "",
];

const NEGATIVE_COMMENTS: [&str; 3] = ["文字が多くて分かりにくい", "もう少し改善できそう", ""];

/// Deterministic demo history for one user.
#[derive(Debug, Clone, Default)]
pub struct SyntheticDataset {
    pub posts: Vec<PostRecord>,
    pub feedback: Vec<FeedbackEvent>,
    pub actions: Vec<ActionLogEvent>,
}

pub fn generate_synthetic_dataset(seed: u64, now: DateTime<Utc>) -> SyntheticDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dataset = SyntheticDataset::default();

    for idx in 0..DEFAULT_POST_COUNT {
        let published_at = now - Duration::days((idx as i64) * 4 + rng.gen_range(0..3));
        let post = sample_post(&mut rng, idx, published_at);

        let feedback_count = rng.gen_range(0..3);
        for _ in 0..feedback_count {
            dataset
                .feedback
                .push(sample_feedback(&mut rng, &post.id, published_at));
        }

        if rng.gen::<f64>() < 0.4 {
            dataset.actions.push(sample_action(&mut rng, idx, &post.id, published_at));
        }

        dataset.posts.push(post);
    }

    dataset
}

fn sample_post(rng: &mut StdRng, idx: usize, published_at: DateTime<Utc>) -> PostRecord {
    let reach = rng.gen_range(200.0_f64..5_000.0).round();
    let engagement = reach * rng.gen_range(0.01..0.12);
    let tag_count = rng.gen_range(0..6);
    let hashtags = HASHTAGS
        .choose_multiple(rng, tag_count)
        .map(|tag| tag.to_string())
        .collect();
    let category = *PostCategory::all().choose(rng).unwrap_or(&PostCategory::Feed);

    PostRecord {
        id: format!("synthetic_{}", idx),
        title: TITLES[idx % TITLES.len()].to_string(),
        content: format!("{} の投稿本文", TITLES[idx % TITLES.len()]),
        hashtags,
        category,
        likes: (engagement * 0.7).round(),
        comments: (engagement * 0.1).round(),
        shares: (engagement * 0.05).round(),
        saves: (engagement * 0.15).round(),
        reach,
        follower_delta: rng.gen_range(-5.0_f64..20.0).round(),
        published_at: Some(published_at),
        satisfied: match rng.gen_range(0..4) {
            0 => Some(true),
            1 => Some(false),
            _ => None,
        },
        memo: None,
    }
}

fn sample_feedback(rng: &mut StdRng, post_id: &str, published_at: DateTime<Utc>) -> FeedbackEvent {
    let roll = rng.gen::<f64>();
    let (sentiment, comment) = if roll < 0.55 {
        (Sentiment::Positive, POSITIVE_COMMENTS.choose(rng).copied())
    } else if roll < 0.8 {
        (Sentiment::Negative, NEGATIVE_COMMENTS.choose(rng).copied())
    } else {
        (Sentiment::Neutral, None)
    };

    FeedbackEvent {
        post_id: Some(post_id.to_string()),
        sentiment,
        weight: Some(rng.gen_range(1..=3) as f64),
        comment: comment.filter(|text| !text.is_empty()).map(str::to_string),
        created_at: Some(published_at + Duration::hours(rng.gen_range(1..48))),
    }
}

fn sample_action(
    rng: &mut StdRng,
    idx: usize,
    post_id: &str,
    published_at: DateTime<Utc>,
) -> ActionLogEvent {
    let kind = if rng.gen::<f64>() < 0.3 {
        ActionKind::Experiment
    } else {
        ActionKind::Advice
    };
    let applied = rng.gen::<f64>() < 0.6;
    let result_delta = if applied && kind == ActionKind::Experiment {
        Some((rng.gen_range(-0.2..0.4_f64) * 100.0).round() / 100.0)
    } else {
        None
    };

    ActionLogEvent {
        id: format!("action_{}", idx),
        post_id: Some(post_id.to_string()),
        kind,
        applied,
        result_delta,
        created_at: Some(published_at + Duration::days(1)),
    }
}

/// Writes the dataset in the layout `JsonRecordSource` reads.
pub async fn write_dataset(
    data_dir: &Path,
    user_id: &str,
    dataset: &SyntheticDataset,
) -> Result<(), String> {
    if !is_valid_user_id(user_id) {
        return Err(format!("invalid user id {:?}", user_id));
    }
    let user_dir = data_dir.join(user_id);
    tokio::fs::create_dir_all(&user_dir)
        .await
        .map_err(|err| format!("failed to create data dir: {}", err))?;

    write_json(&user_dir.join(POSTS_FILE), &dataset.posts).await?;
    write_json(&user_dir.join(FEEDBACK_FILE), &dataset.feedback).await?;
    write_json(&user_dir.join(ACTIONS_FILE), &dataset.actions).await?;
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize {}: {}", path.display(), err))?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, payload)
        .await
        .map_err(|err| format!("failed to write {}: {}", path.display(), err))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|err| format!("failed to finalize {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{JsonRecordSource, RecordSource};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn same_seed_same_dataset() {
        let a = generate_synthetic_dataset(7, fixed_now());
        let b = generate_synthetic_dataset(7, fixed_now());
        assert_eq!(a.posts.len(), DEFAULT_POST_COUNT);
        assert_eq!(a.feedback.len(), b.feedback.len());
        assert_eq!(a.actions.len(), b.actions.len());
        assert_eq!(a.posts[3].reach, b.posts[3].reach);
    }

    #[tokio::test]
    async fn written_dataset_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = generate_synthetic_dataset(11, fixed_now());
        write_dataset(dir.path(), "demo", &dataset).await.unwrap();

        let source = JsonRecordSource::new(dir.path().to_path_buf());
        let posts = source.fetch_post_records("demo").await.unwrap();
        let feedback = source.fetch_feedback_events("demo").await.unwrap();
        assert_eq!(posts.len(), dataset.posts.len());
        assert_eq!(feedback.len(), dataset.feedback.len());
        assert_eq!(posts[0].id, "synthetic_0");
    }
}
