//! Human-readable reasons for WebSocket close codes.

/// Close codes below this are normal shutdowns and never reported.
pub const FIRST_ERROR_CODE: u16 = 1001;

/// Status assumed when a close frame carries no code.
pub const NO_STATUS: u16 = 1005;

/// Status assumed when the socket drops without a close frame.
pub const ABNORMAL: u16 = 1006;

/// Status assumed when the TLS handshake fails.
pub const TLS_HANDSHAKE: u16 = 1015;

/// Whether `code` is a normal shutdown that should stay silent.
pub fn is_benign(code: u16) -> bool {
    code < FIRST_ERROR_CODE
}

/// Map a close code to the text shown to the user.
///
/// `detail` is the close frame's reason string, only used for 1010.
/// `origin` is the `http(s)://host:port` the user can open to accept the
/// server certificate, only used for 1015. Returns `None` for benign codes.
pub fn close_reason(code: u16, detail: &str, origin: &str) -> Option<String> {
    if is_benign(code) {
        return None;
    }

    let reason = match code {
        1001 => "Server closed".to_owned(),
        1002 => "An endpoint is terminating the connection due to a protocol error".to_owned(),
        1003 => "An endpoint is terminating the connection because it has received a type of data it cannot accept.".to_owned(),
        NO_STATUS => "No status code was actually present.".to_owned(),
        ABNORMAL => "The connection was closed abnormally.".to_owned(),
        1007 => "An endpoint is terminating the connection because it has received data within a message that was not consistent with the type of the message.".to_owned(),
        1008 => "An endpoint is terminating the connection because it has received a message that violates its policy.".to_owned(),
        1009 => "An endpoint is terminating the connection because it has received a message that is too big for it to process.".to_owned(),
        1010 => format!(
            "An endpoint (client) is terminating the connection because it has expected the server to negotiate \
             one or more extension, but the server didn't return them in the response message of the WebSocket \
             handshake. Specifically, the extensions that are needed are: {detail}"
        ),
        1011 => "A server is terminating the connection because it encountered an unexpected condition that prevented it from fulfilling the request.".to_owned(),
        TLS_HANDSHAKE => format!(
            "The connection was closed due to a failure to perform a TLS handshake\n\
             Try opening {origin} and bypass any warnings, then reload this page. \
             The WebSocket connection uses the same certificate as this page."
        ),
        _ => "Unknown reason".to_owned(),
    };
    Some(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_codes_are_silent() {
        assert_eq!(close_reason(1000, "", "http://localhost:1441"), None);
        assert_eq!(close_reason(0, "", "http://localhost:1441"), None);
    }

    #[test]
    fn known_codes_are_verbatim() {
        assert_eq!(close_reason(1001, "", "").as_deref(), Some("Server closed"));
        assert_eq!(
            close_reason(1006, "", "").as_deref(),
            Some("The connection was closed abnormally.")
        );
        assert_eq!(
            close_reason(1005, "", "").as_deref(),
            Some("No status code was actually present.")
        );
    }

    #[test]
    fn missing_extension_includes_detail() {
        let reason = close_reason(1010, "permessage-deflate", "").unwrap_or_default();
        assert!(reason.ends_with("the extensions that are needed are: permessage-deflate"));
        assert!(reason.contains("negotiate one or more extension"));
    }

    #[test]
    fn tls_failure_links_to_origin() {
        let reason = close_reason(1015, "", "https://gateway.local:1441").unwrap_or_default();
        assert!(reason.starts_with("The connection was closed due to a failure to perform a TLS handshake"));
        assert!(reason.contains("Try opening https://gateway.local:1441 and bypass any warnings"));
    }

    #[test]
    fn unlisted_codes_are_unknown() {
        assert_eq!(close_reason(4000, "", "").as_deref(), Some("Unknown reason"));
        assert_eq!(close_reason(1004, "", "").as_deref(), Some("Unknown reason"));
    }
}
