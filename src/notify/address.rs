use crate::notify::types::AppenderError;
use lettre::message::Mailbox;

/// Split a `,`/`;` separated address list into mailboxes; blank entries are skipped.
pub fn parse_address(addresses: &str) -> Result<Vec<Mailbox>, AppenderError> {
    addresses
        .split([',', ';'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_mailbox)
        .collect()
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox, AppenderError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| AppenderError::Address(format!("{address}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_commas_and_semicolons() {
        let list = parse_address("ops@example.com, dev@example.com;  oncall@example.com").unwrap();
        let emails: Vec<String> = list.iter().map(|m| m.email.to_string()).collect();
        assert_eq!(
            emails,
            vec!["ops@example.com", "dev@example.com", "oncall@example.com"]
        );
    }

    #[test]
    fn skips_empty_tokens() {
        let list = parse_address(" ,ops@example.com;; ").unwrap();
        assert_eq!(list.len(), 1);
        assert!(parse_address("").unwrap().is_empty());
    }

    #[test]
    fn accepts_display_names() {
        let list = parse_address("Ops Team <ops@example.com>").unwrap();
        assert_eq!(list[0].name.as_deref(), Some("Ops Team"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_address("ops@example.com, not an address"),
            Err(AppenderError::Address(_))
        ));
    }
}
