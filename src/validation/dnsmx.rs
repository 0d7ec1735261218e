use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::error::ProtoErrorKind,
    proto::op::ResponseCode,
    proto::rr::RecordType,
    system_conf::read_system_conf,
};

/// A lookup that could not produce an answer.
///
/// Distinct from "the domain has no MX records", which is a successful
/// lookup returning `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveFault {
    #[error("DNS query timed out after {0:?}")]
    Timeout(Duration),
    #[error("no name server could be reached: {0}")]
    NoConnections(String),
    #[error("DNS protocol error: {0}")]
    Protocol(String),
    #[error("network error: {0}")]
    Io(String),
    #[error("DNS error: {0}")]
    Other(String),
}

/// Raw MX query for a single, already-normalized domain.
///
/// # Returns
/// - `Ok(true)` if the domain publishes at least one MX record
/// - `Ok(false)` if the domain does not exist or publishes no MX record
/// - `Err` if the question could not be answered
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn has_mx(&self, domain: &str) -> Result<bool, ResolveFault>;
}

#[async_trait]
impl<T: MxLookup + ?Sized> MxLookup for Arc<T> {
    async fn has_mx(&self, domain: &str) -> Result<bool, ResolveFault> {
        (**self).has_mx(domain).await
    }
}

/// [`MxLookup`] backed by the system's DNS servers.
#[derive(Clone)]
pub struct DnsMxLookup {
    resolver: TokioAsyncResolver,
    deadline: Duration,
    implicit_mx: bool,
}

impl DnsMxLookup {
    /// Builds a lookup on the system name servers.
    ///
    /// Each attempt against a name server gives up after `timeout`, and a
    /// query is tried `attempts` times before it counts as failed.
    ///
    /// With `implicit_mx`, a domain without MX records still counts as
    /// mail-capable when it has an A or AAAA record (RFC 5321 section 5.1).
    pub fn new(timeout: Duration, attempts: usize, implicit_mx: bool) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = attempts.max(1);

        Self::with_config(system_config(), opts, implicit_mx)
    }

    /// Builds a lookup on explicit name servers and resolver options.
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts, implicit_mx: bool) -> Self {
        let deadline = query_deadline(&config, &opts);
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            deadline,
            implicit_mx,
        }
    }

    /// Upper bound for a single query, retries and name server fallback included.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn bounded<T>(
        &self,
        query: impl Future<Output = Result<T, ResolveError>>,
    ) -> Result<T, ResolveError> {
        tokio::time::timeout(self.deadline, query)
            .await
            .unwrap_or_else(|_| Err(ResolveErrorKind::Timeout.into()))
    }

    /// Checks DNS records for a domain following RFC 5321 requirements
    ///
    /// 1. First checks for MX records (mail server configuration)
    /// 2. If there are none and implicit MX is enabled, checks for A (IPv4)
    ///    or AAAA (IPv6) records
    async fn check_mx_or_a_records(&self, domain: &str) -> Result<bool, ResolveError> {
        match self.bounded(self.resolver.mx_lookup(domain)).await {
            Ok(records) => return Ok(records.iter().next().is_some()),
            Err(e) if is_no_records(&e) && self.implicit_mx => {}
            Err(e) if is_no_records(&e) => return Ok(false),
            Err(e) => return Err(e),
        }

        for record_type in [RecordType::A, RecordType::AAAA] {
            match self.bounded(self.resolver.lookup(domain, record_type)).await {
                Ok(lookup) if lookup.iter().next().is_some() => return Ok(true),
                Ok(_) => {}
                Err(e) if is_no_records(&e) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(false)
    }
}

#[async_trait]
impl MxLookup for DnsMxLookup {
    async fn has_mx(&self, domain: &str) -> Result<bool, ResolveFault> {
        match self.check_mx_or_a_records(domain).await {
            Ok(found) => {
                debug!(domain, found, "MX lookup finished");
                Ok(found)
            }
            Err(e) => Err(classify_error(&e, self.deadline)),
        }
    }
}

/// Reads the system name servers, falling back to the resolver's default
/// upstreams when they cannot be read.
///
/// The resolver's own record cache is left enabled; the pipeline keeps a
/// per-run domain cache on top of it.
fn system_config() -> ResolverConfig {
    match read_system_conf() {
        Ok((config, _)) => config,
        Err(e) => {
            warn!(error = %e, "could not read system DNS configuration, using defaults");
            ResolverConfig::default()
        }
    }
}

/// Every attempt against every distinct name server may run into the
/// per-attempt timeout before the resolver reports a failure.
fn query_deadline(config: &ResolverConfig, opts: &ResolverOpts) -> Duration {
    let servers: HashSet<IpAddr> = config
        .name_servers()
        .iter()
        .map(|server| server.socket_addr.ip())
        .collect();
    let tries = opts.attempts.max(1).saturating_mul(servers.len().max(1));
    opts.timeout
        .saturating_mul(u32::try_from(tries).unwrap_or(u32::MAX))
}

/// NXDOMAIN and empty answers mean "no mail here", not a failed lookup.
fn is_no_records(err: &ResolveError) -> bool {
    matches!(
        err.kind(),
        ResolveErrorKind::NoRecordsFound {
            response_code: ResponseCode::NoError | ResponseCode::NXDomain,
            ..
        }
    )
}

fn classify_error(err: &ResolveError, deadline: Duration) -> ResolveFault {
    match err.kind() {
        ResolveErrorKind::Timeout => ResolveFault::Timeout(deadline),
        ResolveErrorKind::NoConnections => ResolveFault::NoConnections(err.to_string()),
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            ResolveFault::Timeout(deadline)
        }
        ResolveErrorKind::Proto(proto) => ResolveFault::Protocol(proto.to_string()),
        ResolveErrorKind::Io(io) => ResolveFault::Io(io.to_string()),
        _ => ResolveFault::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_dns_resolver::config::NameServerConfigGroup;

    const DEADLINE: Duration = Duration::from_secs(5);

    #[test]
    fn test_timeout_is_a_fault() {
        let err = ResolveError::from(ResolveErrorKind::Timeout);
        assert!(!is_no_records(&err));
        assert_eq!(classify_error(&err, DEADLINE), ResolveFault::Timeout(DEADLINE));
    }

    #[test]
    fn test_no_connections_is_a_fault() {
        let err = ResolveError::from(ResolveErrorKind::NoConnections);
        assert!(matches!(
            classify_error(&err, DEADLINE),
            ResolveFault::NoConnections(_)
        ));
    }

    #[test]
    fn test_io_error_is_a_fault() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ResolveError::from(io);
        assert!(matches!(classify_error(&err, DEADLINE), ResolveFault::Io(_)));
    }

    #[test]
    fn test_message_error_is_other() {
        let err = ResolveError::from(ResolveErrorKind::Message("boom"));
        assert_eq!(
            classify_error(&err, DEADLINE),
            ResolveFault::Other(err.to_string())
        );
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            ResolveFault::Timeout(Duration::from_secs(2)).to_string(),
            "DNS query timed out after 2s"
        );
        assert_eq!(
            ResolveFault::Io("refused".to_string()).to_string(),
            "network error: refused"
        );
    }

    fn opts(timeout: Duration, attempts: usize) -> ResolverOpts {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = attempts;
        opts
    }

    fn servers(ips: &[IpAddr]) -> ResolverConfig {
        ResolverConfig::from_parts(None, vec![], NameServerConfigGroup::from_ips_clear(ips, 53, true))
    }

    #[test]
    fn test_deadline_covers_every_attempt() {
        let one = servers(&[IpAddr::from([192, 0, 2, 1])]);
        let timeout = Duration::from_secs(2);

        assert_eq!(query_deadline(&one, &opts(timeout, 1)), timeout);
        assert_eq!(query_deadline(&one, &opts(timeout, 3)), timeout * 3);
        // Zero attempts still sends the query once
        assert_eq!(query_deadline(&one, &opts(timeout, 0)), timeout);
    }

    #[test]
    fn test_deadline_covers_name_server_fallback() {
        // UDP and TCP entries of one address count as a single server
        let two = servers(&[IpAddr::from([192, 0, 2, 1]), IpAddr::from([192, 0, 2, 2])]);
        assert_eq!(two.name_servers().len(), 4);

        let timeout = Duration::from_secs(2);
        assert_eq!(query_deadline(&two, &opts(timeout, 3)), timeout * 6);
        assert_eq!(
            query_deadline(&ResolverConfig::new(), &opts(timeout, 2)),
            timeout * 2
        );
    }

    #[test]
    fn test_deadline_saturates() {
        let one = servers(&[IpAddr::from([192, 0, 2, 1])]);
        assert_eq!(
            query_deadline(&one, &opts(Duration::MAX, 2)),
            Duration::MAX
        );
    }

    #[tokio::test]
    async fn test_arc_forwards_to_inner_lookup() {
        let mut mock = MockMxLookup::new();
        mock.expect_has_mx().times(1).returning(|_| Ok(true));

        let shared: Arc<MockMxLookup> = Arc::new(mock);
        assert_eq!(shared.has_mx("example.com").await, Ok(true));
    }

    // The following tests talk to real name servers
    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_domain_with_mx() {
        let lookup = DnsMxLookup::new(Duration::from_secs(5), 2, false);
        assert_eq!(lookup.has_mx("gmail.com").await, Ok(true));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_nonexistent_domain() {
        let lookup = DnsMxLookup::new(Duration::from_secs(5), 2, false);
        assert_eq!(
            lookup.has_mx("nonexistent-domain-12345.invalid").await,
            Ok(false)
        );
    }

    #[tokio::test]
    #[ignore = "requires a route that silently drops packets to 192.0.2.1"]
    async fn test_retries_run_before_the_deadline() {
        let unroutable = || servers(&[IpAddr::from([192, 0, 2, 1])]);
        let timeout = Duration::from_millis(200);

        let single = DnsMxLookup::with_config(unroutable(), opts(timeout, 1), false);
        let started = std::time::Instant::now();
        assert!(single.has_mx("example.com").await.is_err());
        let single_elapsed = started.elapsed();

        let retried = DnsMxLookup::with_config(unroutable(), opts(timeout, 3), false);
        assert_eq!(retried.deadline(), timeout * 3);
        let started = std::time::Instant::now();
        assert!(retried.has_mx("example.com").await.is_err());
        let retried_elapsed = started.elapsed();

        assert!(retried_elapsed >= timeout * 2);
        assert!(retried_elapsed > single_elapsed);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_implicit_mx_fallback() {
        // localhost has an A record but no MX
        let strict = DnsMxLookup::new(Duration::from_secs(5), 1, false);
        let lenient = DnsMxLookup::new(Duration::from_secs(5), 1, true);
        assert_eq!(strict.has_mx("localhost").await, Ok(false));
        assert_eq!(lenient.has_mx("localhost").await, Ok(true));
    }
}
