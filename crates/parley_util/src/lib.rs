#![forbid(unsafe_code)]

pub mod endpoint {
	use url::Url;

	const WS_SCHEMES: &[&str] = &["ws", "wss"];
	const HTTP_SCHEMES: &[&str] = &["http", "https"];

	/// Parse `s` as an endpoint URL with one of `schemes`.
	///
	/// Requires a host and a non-zero port (explicit or the scheme default).
	/// Credentials, query strings and fragments are rejected.
	pub fn parse_endpoint(s: &str, schemes: &[&str]) -> Result<Url, String> {
		let s = s.trim();
		if s.is_empty() {
			return Err("endpoint must be non-empty (expected scheme://host[:port])".to_string());
		}

		let url = Url::parse(s).map_err(|e| format!("invalid endpoint {s:?}: {e}"))?;

		if !schemes.contains(&url.scheme()) {
			return Err(format!("expected {} endpoint: {s}", schemes.join(" or ")));
		}
		if url.host_str().is_none_or(str::is_empty) {
			return Err(format!("invalid endpoint host: {s}"));
		}
		if url.port_or_known_default().is_none_or(|p| p == 0) {
			return Err(format!("invalid endpoint port (expected 1..=65535): {s}"));
		}
		if !url.username().is_empty() || url.password().is_some() {
			return Err(format!("credentials are not allowed in endpoint: {s}"));
		}
		if url.query().is_some() || url.fragment().is_some() {
			return Err(format!("query/fragment not allowed in endpoint: {s}"));
		}
		Ok(url)
	}

	/// Validate a push-channel endpoint (`ws://` or `wss://`).
	pub fn validate_ws_endpoint(s: &str) -> Result<Url, String> {
		parse_endpoint(s, WS_SCHEMES)
	}

	/// Validate a REST base endpoint (`http://` or `https://`).
	pub fn validate_http_endpoint(s: &str) -> Result<Url, String> {
		parse_endpoint(s, HTTP_SCHEMES)
	}

	/// `host:port` of a parsed endpoint; IPv6 hosts stay bracketed.
	pub fn hostport(url: &Url) -> Option<String> {
		Some(format!("{}:{}", url.host_str()?, url.port_or_known_default()?))
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		#[test]
		fn dns_hostname_gets_default_port() {
			let url = validate_ws_endpoint("wss://chat.example.com").unwrap();
			assert_eq!(hostport(&url).as_deref(), Some("chat.example.com:443"));
			let url = validate_ws_endpoint("ws://chat.example.com/ws").unwrap();
			assert_eq!(hostport(&url).as_deref(), Some("chat.example.com:80"));
		}

		#[test]
		fn ipv4_with_port_and_path() {
			let url = validate_http_endpoint("http://127.0.0.1:5000/api/").unwrap();
			assert_eq!(hostport(&url).as_deref(), Some("127.0.0.1:5000"));
			assert_eq!(url.path(), "/api/");
		}

		#[test]
		fn bracketed_ipv6() {
			let url = validate_ws_endpoint("ws://[::1]:8080").unwrap();
			assert_eq!(hostport(&url).as_deref(), Some("[::1]:8080"));
			assert!(validate_ws_endpoint("ws://::1:8080").is_err());
		}

		#[test]
		fn rejects_query_fragment_credentials_and_unknown_scheme() {
			assert!(validate_ws_endpoint("ws://127.0.0.1:8080?x=y").is_err());
			assert!(validate_ws_endpoint("ws://127.0.0.1:8080#frag").is_err());
			assert!(validate_ws_endpoint("ws://user:pw@127.0.0.1:8080").is_err());
			assert!(validate_ws_endpoint("quic://127.0.0.1:8080").is_err());
			assert!(validate_ws_endpoint("127.0.0.1:8080").is_err());
			assert!(validate_ws_endpoint("   ").is_err());
		}

		#[test]
		fn rejects_port_zero_and_garbage_port() {
			assert!(validate_ws_endpoint("ws://127.0.0.1:0").is_err());
			assert!(validate_ws_endpoint("ws://127.0.0.1:abc").is_err());
		}

		#[test]
		fn scheme_specific_validation() {
			assert!(validate_ws_endpoint("wss://chat.example.com/socket").is_ok());
			assert!(validate_ws_endpoint("https://chat.example.com").is_err());
			assert!(validate_http_endpoint("https://api.example.com/v1").is_ok());
			assert!(validate_http_endpoint("ws://api.example.com").is_err());
		}
	}
}
