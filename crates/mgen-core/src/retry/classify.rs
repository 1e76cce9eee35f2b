//! Map provider call errors to failure classes.

use super::error::ClientError;
use super::policy::FailureClass;

pub fn classify(e: &ClientError) -> FailureClass {
    match e {
        ClientError::Curl(ce) => curl_error_class(ce),
        ClientError::Transport(_) => FailureClass::Transient,
        ClientError::Http(code) => http_status_class(*code),
        ClientError::Malformed(_) | ClientError::Rejected(_) => FailureClass::Fatal,
    }
}

fn http_status_class(code: u32) -> FailureClass {
    match code {
        429 | 503 => FailureClass::Throttled,
        408 | 500..=599 => FailureClass::Transient,
        // 400 bad prompt, 401/403 expired token, 404 unknown operation.
        _ => FailureClass::Fatal,
    }
}

/// Transfer-level failures are transient; setup errors (bad URL, bad option) are not.
fn curl_error_class(e: &curl::Error) -> FailureClass {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
    {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}
