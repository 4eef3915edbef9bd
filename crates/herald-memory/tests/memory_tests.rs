#[cfg(test)]
mod tests {
    use herald_core::{ActionKind, Message};
    use herald_memory::Memory;

    fn msg(content: &str, cause: ActionKind) -> Message {
        Message::caused_by(content, cause)
    }

    /// Deterministic pseudo-random cause sequence (xorshift) so the index law
    /// is checked against a long, mixed history.
    fn mixed_history(len: usize) -> Vec<Message> {
        let mut x: u32 = 0x9e37_79b9;
        (0..len)
            .map(|i| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                let kind = ActionKind::ALL[(x as usize) % ActionKind::ALL.len()];
                msg(&format!("m{i}"), kind)
            })
            .collect()
    }

    #[test]
    fn test_get_by_cause_matches_filtered_log() {
        let mut mem = Memory::new();
        mem.extend(mixed_history(500));

        for kind in ActionKind::ALL {
            let expected: Vec<&Message> = mem
                .messages()
                .iter()
                .filter(|m| m.cause_by() == kind)
                .collect();
            let got = mem.get_by_cause(kind);
            assert_eq!(got, expected, "index diverged for {kind}");
            assert_eq!(mem.count_by_cause(kind), expected.len());
        }
    }

    #[test]
    fn test_get_by_cause_empty_bucket() {
        let mut mem = Memory::new();
        mem.append(msg("only", ActionKind::UserRequirement));
        assert!(mem.get_by_cause(ActionKind::SubAction).is_empty());
        assert!(mem.latest_by_cause(ActionKind::SubAction).is_none());
    }

    #[test]
    fn test_get_by_causes_preserves_insertion_order() {
        let mut mem = Memory::new();
        mem.append(msg("a", ActionKind::UserRequirement));
        mem.append(msg("b", ActionKind::WriteCrawlerCode));
        mem.append(msg("c", ActionKind::ParseSubRequirement));
        mem.append(msg("d", ActionKind::UserRequirement));

        let got: Vec<&str> = mem
            .get_by_causes(&[ActionKind::UserRequirement, ActionKind::ParseSubRequirement])
            .into_iter()
            .map(Message::content)
            .collect();
        assert_eq!(got, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_get_by_causes_ignores_repeated_kinds() {
        let mut mem = Memory::new();
        mem.append(msg("a", ActionKind::UserRequirement));
        let got = mem.get_by_causes(&[ActionKind::UserRequirement, ActionKind::UserRequirement]);
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn test_latest_n() {
        let mut mem = Memory::new();
        for i in 0..5 {
            mem.append(msg(&format!("m{i}"), ActionKind::UserRequirement));
        }
        let recent: Vec<&str> = mem.latest_n(2).iter().map(Message::content).collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(mem.latest_n(50).len(), 5);
        assert!(mem.latest_n(0).is_empty());
    }

    #[test]
    fn test_latest_and_latest_by_cause() {
        let mut mem = Memory::new();
        assert!(mem.latest().is_none());
        mem.append(msg("first parse", ActionKind::ParseSubRequirement));
        mem.append(msg("code", ActionKind::WriteCrawlerCode));
        mem.append(msg("second parse", ActionKind::ParseSubRequirement));

        assert_eq!(mem.latest().unwrap().content(), "second parse");
        assert_eq!(
            mem.latest_by_cause(ActionKind::WriteCrawlerCode).unwrap().content(),
            "code"
        );
        assert_eq!(
            mem.latest_by_cause(ActionKind::ParseSubRequirement).unwrap().content(),
            "second parse"
        );
    }

    #[test]
    fn test_len_and_clone_independence() {
        let mut mem = Memory::new();
        assert!(mem.is_empty());
        mem.append(msg("x", ActionKind::UserRequirement));
        let snapshot = mem.clone();
        mem.append(msg("y", ActionKind::UserRequirement));
        assert_eq!(mem.len(), 2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get_by_cause(ActionKind::UserRequirement).len(), 1);
    }
}
