/// Checks whether a domain publishes MX records.
///
/// Defines the [`dnsmx::MxLookup`] trait used by the resolver and its
/// production implementation on top of `trust-dns-resolver`:
/// 1. Queries MX records for the domain
/// 2. Optionally falls back to A/AAAA records (implicit MX)
///
/// # Returns
/// `Ok(true)` if mail servers were found, `Ok(false)` for NXDOMAIN or an
/// empty answer, and a [`dnsmx::ResolveFault`] for timeouts, unreachable
/// name servers and malformed responses.
pub mod dnsmx;

/// Whitelist of public mailbox providers whose MX check is skipped.
pub mod providers;

/// Combines the whitelist, the per-run domain cache and an [`dnsmx::MxLookup`]
/// into a single `resolve(domain)` call with single-flight semantics.
pub mod resolver;

/// Validates an email address against a conservative ASCII grammar.
///
/// # Examples
/// ```
/// use email_splitter::validation::syntax::is_valid_email;
///
/// assert!(is_valid_email("user.name+tag@example.com"));
/// assert!(!is_valid_email("invalid@ex_mple.com"));
/// ```
///
/// # Arguments
/// * `email` - A string slice containing the email address to validate
///
/// # Returns
/// `true` if the email address meets all syntax requirements, `false` otherwise
pub mod syntax;
