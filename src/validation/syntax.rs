/// Maximum address length (RFC 5321 path limit minus the angle brackets)
const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

/// Validates an email address against a conservative ASCII grammar.
///
/// The address must consist of exactly one `@` separating:
/// - a non-empty local part made of letters, digits and `. _ % + -`
/// - a domain of at least two dot-separated labels, each made of letters,
///   digits and `-` (not at either end), whose final label is two or more
///   letters
///
/// Quoted local parts, domain literals and internationalized addresses are
/// rejected. The caller is expected to trim surrounding whitespace.
///
/// # Examples
/// ```
/// use email_splitter::validation::syntax::is_valid_email;
///
/// assert!(is_valid_email("user.name+tag@example.com"));
/// assert!(!is_valid_email("foo@invalid_email"));
/// assert!(!is_valid_email("two@@example.com"));
/// ```
///
/// # Returns
/// `true` if the address satisfies every rule, `false` otherwise. Never panics.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }

    let (local_part, domain_part) = match split_address(email) {
        Some(parts) => parts,
        None => return false,
    };

    if local_part.len() > MAX_LOCAL_LEN {
        return false;
    }

    is_valid_local_part(local_part) && is_valid_domain_part(domain_part)
}

/// Returns the text after the last `@`, if any.
pub fn domain_of(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

/// Splits on the `@`, requiring exactly one
fn split_address(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.split_once('@')?;
    if domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

fn is_valid_local_part(local: &str) -> bool {
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
}

fn is_valid_domain_part(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    let Some((top_level, _)) = labels.split_last() else {
        return false;
    };

    labels.len() >= 2 && labels.iter().all(|label| is_valid_label(label)) && is_valid_top_level(top_level)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_top_level(label: &str) -> bool {
    label.len() >= 2 && label.chars().all(|c| c.is_ascii_alphabetic())
}
