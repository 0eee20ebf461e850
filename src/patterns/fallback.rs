use crate::patterns::{PatternSummary, SummarySource};
use crate::scoring::{HashtagWeight, Tag};

pub fn tag_description(tag: Tag) -> &'static str {
    match tag {
        Tag::Gold => "再現性の高い成功パターン",
        Tag::Gray => "反応は良いが数値が伸び切らないパターン",
        Tag::Red => "改善余地の大きいパターン",
        Tag::Neutral => "目立った傾向のない投稿",
    }
}

fn cautions(tag: Tag) -> &'static [&'static str] {
    match tag {
        Tag::Gold => &[
            "同じ構成の繰り返しによるマンネリ化に注意しましょう",
            "成功要因を一つずつ検証してから横展開しましょう",
        ],
        Tag::Gray => &[
            "好意的な反応がリーチや保存数に結びついていません",
            "新規ユーザーへの導線が弱い可能性があります",
        ],
        Tag::Red => &[
            "冒頭で内容が伝わらず離脱されている可能性があります",
            "ハッシュタグが少なく発見されにくい状態です",
        ],
        Tag::Neutral => &[],
    }
}

fn suggested_angles(tag: Tag) -> &'static [&'static str] {
    match tag {
        Tag::Gold => &[
            "反応の良かった構成を別のテーマに応用する",
            "保存されやすい要素を冒頭に配置する",
        ],
        Tag::Gray => &[
            "ハッシュタグと投稿時間を見直してリーチを伸ばす",
            "保存やシェアを促す一言を添える",
        ],
        Tag::Red => &[
            "タイトルを具体的にして冒頭で価値を示す",
            "関連性の高いハッシュタグを3つ以上付ける",
        ],
        Tag::Neutral => &[],
    }
}

/// Deterministic summary used whenever the narrative call does not succeed.
pub fn fallback_summary(
    tag: Tag,
    post_count: usize,
    sample_size: usize,
    top_hashtags: Vec<HashtagWeight>,
) -> PatternSummary {
    let mut summary = format!(
        "{}件の投稿が「{}」({})に分類されました。",
        post_count,
        tag_description(tag),
        tag.label()
    );
    if !top_hashtags.is_empty() {
        let listed: Vec<String> = top_hashtags.iter().map(|entry| format!("#{}", entry.tag)).collect();
        summary.push_str(&format!("よく使われたハッシュタグ: {}", listed.join(" ")));
    }

    PatternSummary {
        tag,
        summary,
        key_themes: top_hashtags.iter().map(|entry| format!("#{}", entry.tag)).collect(),
        cautions: cautions(tag).iter().map(|text| text.to_string()).collect(),
        suggested_angles: suggested_angles(tag).iter().map(|text| text.to_string()).collect(),
        source: SummarySource::Fallback,
        post_count,
        sample_size,
        top_hashtags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_count_tag_and_hashtags() {
        let top = vec![
            HashtagWeight {
                tag: "cafe".to_string(),
                weight: 4.0,
            },
            HashtagWeight {
                tag: "vlog".to_string(),
                weight: 2.0,
            },
        ];
        let summary = fallback_summary(Tag::Gold, 5, 5, top);
        assert!(summary.summary.starts_with("5件の投稿"));
        assert!(summary.summary.contains("(gold)"));
        assert!(summary.summary.contains("#cafe #vlog"));
        assert_eq!(summary.key_themes, vec!["#cafe".to_string(), "#vlog".to_string()]);
        assert_eq!(summary.cautions.len(), 2);
        assert_eq!(summary.source, SummarySource::Fallback);
    }

    #[test]
    fn works_without_hashtags() {
        let summary = fallback_summary(Tag::Red, 1, 1, Vec::new());
        assert!(summary.key_themes.is_empty());
        assert!(!summary.suggested_angles.is_empty());
    }
}
