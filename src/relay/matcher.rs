//! 传输匹配 - 判断新通知与已发送传输的关系

use super::transfer::{NormalizedNotification, PendingTransfer};

/// 匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// 同一来源且内容完全相同，丢弃新通知
    Duplicate,
    /// 同一来源但内容已更新，旧传输需要从手表上关闭
    Supersedes,
    /// 无关
    Unrelated,
}

/// 比较已发送传输与新通知
///
/// 来源 ID、包名按值相等比较；旧传输没有 tag 时视为匹配任意 tag。
/// 任意一方是列表条目时总是无关。
pub fn classify(prior: &PendingTransfer, incoming: &NormalizedNotification) -> MatchKind {
    if prior.is_list_notification || incoming.is_list_notification {
        return MatchKind::Unrelated;
    }

    let same_id = matches!((prior.source_id, incoming.source_id), (Some(a), Some(b)) if a == b);
    let same_package = prior.source_package == incoming.source_package;
    let tag_matches = prior.source_tag.is_none() || prior.source_tag == incoming.source_tag;

    if !(same_id && same_package && tag_matches) {
        return MatchKind::Unrelated;
    }

    if prior.title == incoming.title
        && prior.subtitle == incoming.subtitle
        && prior.text == incoming.text
    {
        MatchKind::Duplicate
    } else {
        MatchKind::Supersedes
    }
}

/// 手机端关闭事件是否对应此传输（tag 相等或都为空）
pub fn matches_dismissal(
    transfer: &PendingTransfer,
    source_id: i32,
    package: &str,
    tag: Option<&str>,
) -> bool {
    !transfer.is_list_notification
        && transfer.source_id == Some(source_id)
        && transfer.source_package.as_deref() == Some(package)
        && transfer.source_tag.as_deref() == tag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior(tag: Option<&str>) -> PendingTransfer {
        let n = NormalizedNotification::new("Chat", "Alice", "hello")
            .with_source(1000, "com.chat", tag.map(str::to_string));
        PendingTransfer::from_notification(1, n, 80)
    }

    fn incoming(tag: Option<&str>, text: &str) -> NormalizedNotification {
        NormalizedNotification::new("Chat", "Alice", text)
            .with_source(1000, "com.chat", tag.map(str::to_string))
    }

    #[test]
    fn test_identical_is_duplicate() {
        assert_eq!(
            classify(&prior(Some("t")), &incoming(Some("t"), "hello")),
            MatchKind::Duplicate
        );
    }

    #[test]
    fn test_updated_content_supersedes() {
        assert_eq!(
            classify(&prior(Some("t")), &incoming(Some("t"), "hello again")),
            MatchKind::Supersedes
        );
    }

    #[test]
    fn test_prior_without_tag_matches_any_tag() {
        assert_eq!(
            classify(&prior(None), &incoming(Some("t"), "hello")),
            MatchKind::Duplicate
        );
        assert_eq!(
            classify(&prior(Some("a")), &incoming(Some("b"), "hello")),
            MatchKind::Unrelated
        );
    }

    #[test]
    fn test_different_identity_unrelated() {
        let other_id = NormalizedNotification::new("Chat", "Alice", "hello").with_source(
            1001,
            "com.chat",
            None,
        );
        assert_eq!(classify(&prior(None), &other_id), MatchKind::Unrelated);

        let other_pkg =
            NormalizedNotification::new("Chat", "Alice", "hello").with_source(1000, "com.mail", None);
        assert_eq!(classify(&prior(None), &other_pkg), MatchKind::Unrelated);

        let no_source = NormalizedNotification::new("Chat", "Alice", "hello");
        assert_eq!(classify(&prior(None), &no_source), MatchKind::Unrelated);
    }

    #[test]
    fn test_large_source_ids_compare_by_value() {
        let big = 1_000_000_007;
        let p = PendingTransfer::from_notification(
            1,
            NormalizedNotification::new("a", "", "b").with_source(big, "p", None),
            80,
        );
        let n = NormalizedNotification::new("a", "", "b").with_source(big, "p", None);
        assert_eq!(classify(&p, &n), MatchKind::Duplicate);
    }

    #[test]
    fn test_list_entries_never_match() {
        let n = incoming(None, "hello").as_list_entry();
        assert_eq!(classify(&prior(None), &n), MatchKind::Unrelated);
    }

    #[test]
    fn test_dismissal_requires_exact_tag() {
        let tagged = prior(Some("t"));
        assert!(matches_dismissal(&tagged, 1000, "com.chat", Some("t")));
        assert!(!matches_dismissal(&tagged, 1000, "com.chat", None));
        assert!(!matches_dismissal(&tagged, 1000, "com.mail", Some("t")));

        let untagged = prior(None);
        assert!(matches_dismissal(&untagged, 1000, "com.chat", None));
        assert!(!matches_dismissal(&untagged, 1000, "com.chat", Some("t")));
    }
}
