// # HTTP API IP Detector
//
// This crate provides an IP detector that asks public "what is my IP"
// services for the host's WAN addresses.
//
// ## Behavior
//
// Each family has an ordered list of endpoints. They are tried one after
// another and the first answer that parses as an address of the requested
// family wins. Endpoints that fail or answer garbage are logged and
// skipped. When every endpoint fails the detector reports an
// `AddressDetection` error and the engine decides whether the run goes on.
//
// IPv6 answers are split into network prefix and interface identifier
// when a prefix length is configured.

use async_trait::async_trait;
use dnsync_core::config::DetectorConfig;
use dnsync_core::detector::decorate_ipv6;
use dnsync_core::net::{ipv6, Ipv4, Ipv6};
use dnsync_core::traits::{IpDetector, IpDetectorFactory};
use dnsync_core::{Error, ProviderRegistry, Result};
use std::time::Duration;

/// Default IPv4 services, plain text answers
pub const DEFAULT_IPV4_URLS: &[&str] = &["https://api.ipify.org", "https://ip4.seeip.org"];

/// Default IPv6 services, plain text answers
pub const DEFAULT_IPV6_URLS: &[&str] = &["https://v6.ident.me/", "https://ip6.seeip.org"];

/// Default HTTP timeout per endpoint (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// IP detector polling public HTTP APIs
#[derive(Debug, Clone)]
pub struct ApiDetector {
    ipv4_urls: Vec<String>,
    ipv6_urls: Vec<String>,
    prefix_length: Option<u8>,
    client: reqwest::Client,
}

impl ApiDetector {
    /// Create a detector
    ///
    /// # Parameters
    ///
    /// - `ipv4_urls` / `ipv6_urls`: endpoints tried in order; empty lists
    ///   fall back to the built-in services
    /// - `prefix_length`: network prefix length of the IPv6 uplink
    pub fn new(
        ipv4_urls: Vec<String>,
        ipv6_urls: Vec<String>,
        prefix_length: Option<u8>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            ipv4_urls: or_defaults(ipv4_urls, DEFAULT_IPV4_URLS),
            ipv6_urls: or_defaults(ipv6_urls, DEFAULT_IPV6_URLS),
            prefix_length,
            client,
        })
    }

    /// Detector using the built-in services
    pub fn with_defaults(prefix_length: Option<u8>) -> Result<Self> {
        Self::new(Vec::new(), Vec::new(), prefix_length)
    }

    pub fn ipv4_urls(&self) -> &[String] {
        &self.ipv4_urls
    }

    pub fn ipv6_urls(&self) -> &[String] {
        &self.ipv6_urls
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::address_detection(format!("Request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::address_detection(format!(
                "{url} answered HTTP {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::address_detection(format!("Failed to read response of {url}: {e}")))?;
        Ok(text.trim().to_string())
    }

    /// First endpoint answer accepted by `parse`
    async fn first_answer<T>(
        &self,
        urls: &[String],
        family: &str,
        parse: impl Fn(&str) -> Result<T>,
    ) -> Result<T> {
        for url in urls {
            let answer = self.fetch_text(url).await.and_then(|text| parse(&text));
            match answer {
                Ok(ip) => return Ok(ip),
                Err(e) => tracing::warn!(url = %url, error = %e, "Error while fetching external {} address", family),
            }
        }
        Err(Error::address_detection(format!(
            "No external {family} address found ({} endpoint(s) tried)",
            urls.len()
        )))
    }
}

fn or_defaults(urls: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if urls.is_empty() {
        defaults.iter().map(|url| url.to_string()).collect()
    } else {
        urls
    }
}

fn parse_ipv4(text: &str) -> Result<Ipv4> {
    let ip = Ipv4::new(text);
    if ip.validate() {
        Ok(ip)
    } else {
        Err(Error::address_detection(format!("Not an IPv4 address: {text}")))
    }
}

fn parse_ipv6(text: &str, prefix_length: Option<u8>) -> Result<Ipv6> {
    if !ipv6::validate(text) {
        return Err(Error::address_detection(format!("Not an IPv6 address: {text}")));
    }
    Ok(decorate_ipv6(text.to_string(), prefix_length))
}

#[async_trait]
impl IpDetector for ApiDetector {
    fn detector_name(&self) -> &'static str {
        "api"
    }

    async fn wan_ipv4(&self) -> Result<Ipv4> {
        self.first_answer(&self.ipv4_urls, "IPv4", parse_ipv4).await
    }

    async fn wan_ipv6(&self) -> Result<Ipv6> {
        let prefix_length = self.prefix_length;
        self.first_answer(&self.ipv6_urls, "IPv6", |text| parse_ipv6(text, prefix_length))
            .await
    }
}

/// Factory for creating API detectors
pub struct ApiDetectorFactory;

impl IpDetectorFactory for ApiDetectorFactory {
    fn create(&self, config: &DetectorConfig) -> Result<Box<dyn IpDetector>> {
        match config {
            DetectorConfig::Api {
                ipv4_urls,
                ipv6_urls,
                prefix_length,
            } => Ok(Box::new(ApiDetector::new(
                ipv4_urls.clone(),
                ipv6_urls.clone(),
                *prefix_length,
            )?)),
            _ => Err(Error::config("Invalid config for API detector")),
        }
    }
}

/// Register the API detector with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_detector("api", Box::new(ApiDetectorFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Server answering `GET /ip` with `status` and a plain text `body`
    async fn ip_server(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn ip_url(server: &MockServer) -> String {
        format!("{}/ip", server.uri())
    }

    /// Detector talking to local mock servers directly
    fn local_detector(ipv4_urls: Vec<String>, ipv6_urls: Vec<String>, prefix_length: Option<u8>) -> ApiDetector {
        ApiDetector {
            ipv4_urls,
            ipv6_urls,
            prefix_length,
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[test]
    fn test_defaults_used_for_empty_lists() {
        let detector = ApiDetector::with_defaults(None).unwrap();
        assert_eq!(detector.ipv4_urls().len(), DEFAULT_IPV4_URLS.len());
        assert_eq!(detector.ipv6_urls()[0], DEFAULT_IPV6_URLS[0]);

        let detector = ApiDetector::new(vec!["https://ip.example".into()], vec![], None).unwrap();
        assert_eq!(detector.ipv4_urls(), ["https://ip.example".to_string()]);
    }

    #[test]
    fn test_parse_answers() {
        assert_eq!(parse_ipv4("203.0.113.7").unwrap().address(), "203.0.113.7");
        assert!(parse_ipv4("2001:db8::1").is_err());
        assert!(parse_ipv4("<html>").is_err());

        let ip = parse_ipv6("2001:db8:1:2::10", Some(64)).unwrap();
        assert_eq!(ip.network_prefix(), Some("2001:db8:1:2"));
        assert!(matches!(
            parse_ipv6("203.0.113.7", None),
            Err(Error::AddressDetection(_))
        ));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_endpoint() {
        let broken = ip_server(503, "maintenance").await;
        let working = ip_server(200, "203.0.113.7\n").await;
        let detector = local_detector(vec![ip_url(&broken), ip_url(&working)], vec![], None);

        let ip = detector.wan_ipv4().await.unwrap();
        assert_eq!(ip.address(), "203.0.113.7");
    }

    #[tokio::test]
    async fn test_first_answer_wins() {
        let first = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2001:db8:1:2::10"))
            .expect(1)
            .mount(&first)
            .await;
        let second = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2001:db8::99"))
            .expect(0)
            .mount(&second)
            .await;

        let detector = local_detector(vec![], vec![first.uri(), second.uri()], Some(64));
        let ip = detector.wan_ipv6().await.unwrap();
        assert_eq!(ip.address(), Some("2001:db8:1:2::10"));
        assert_eq!(ip.network_cidr().as_deref(), Some("2001:db8:1:2::/64"));
    }

    #[tokio::test]
    async fn test_wrong_family_answer_is_skipped() {
        let server = ip_server(200, "2001:db8::10").await;
        let detector = local_detector(vec![ip_url(&server)], vec![], None);

        assert!(matches!(
            detector.wan_ipv4().await,
            Err(Error::AddressDetection(_))
        ));
    }

    #[tokio::test]
    async fn test_all_endpoints_failing() {
        let server = ip_server(500, "").await;
        let detector = local_detector(vec![], vec![ip_url(&server)], Some(64));
        let err = detector.wan_ipv6().await.unwrap_err();
        assert!(matches!(err, Error::AddressDetection(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_factory_creation() {
        let config = DetectorConfig::Api {
            ipv4_urls: vec![],
            ipv6_urls: vec![],
            prefix_length: Some(56),
        };
        let detector = ApiDetectorFactory.create(&config).unwrap();
        assert_eq!(detector.detector_name(), "api");

        let wrong = DetectorConfig::Static {
            ipv4: None,
            ipv6: None,
            prefix_length: None,
        };
        assert!(ApiDetectorFactory.create(&wrong).is_err());
    }

    #[test]
    fn test_register() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_detector("api"));
    }
}
