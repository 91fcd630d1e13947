/*!
 * Line Protocol
 *
 * One JSON object per line in each direction:
 *
 * ```text
 * -> {"method":"PUT","queue":"jobs","message":"hello"}
 * <- {"status":200}
 * -> {"method":"GET","queue":"jobs","timeout":5}
 * <- {"status":200,"message":"hello"}
 * -> {"method":"STATS","queue":"jobs"}
 * <- {"status":200,"stats":{...}}
 * ```
 *
 * Failures carry `{"status":N,"error":"..."}`.
 */

use super::types::{status, ApiError, ApiResult};
use crate::queue::EngineStats;
use serde::{Deserialize, Serialize};

/// Client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum Request {
    Put {
        queue: String,
        message: String,
    },
    Get {
        queue: String,
        /// Wait limit in whole seconds, tightened further by the server timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Stats {
        queue: String,
    },
}

impl Request {
    /// Decode one request line
    pub fn decode(line: &str) -> ApiResult<Self> {
        let request: Request =
            serde_json::from_str(line).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        if request.queue().is_empty() {
            return Err(ApiError::InvalidRequest("queue name is empty".into()));
        }
        Ok(request)
    }

    pub fn method(&self) -> &'static str {
        match self {
            Request::Put { .. } => "PUT",
            Request::Get { .. } => "GET",
            Request::Stats { .. } => "STATS",
        }
    }

    pub fn queue(&self) -> &str {
        match self {
            Request::Put { queue, .. } | Request::Get { queue, .. } | Request::Stats { queue } => {
                queue
            }
        }
    }
}

/// Server response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<EngineStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: status::OK,
            message: None,
            stats: None,
            error: None,
        }
    }

    pub fn with_message(message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::ok()
        }
    }

    pub fn with_stats(stats: EngineStats) -> Self {
        Self {
            stats: Some(stats),
            ..Self::ok()
        }
    }

    pub fn error(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            ..Self::ok()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == status::OK
    }

    /// Encode as a single line, including the trailing newline
    pub fn encode(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":{},"error":"response encoding failed: {}"}}"#,
                status::INTERNAL_ERROR,
                e.to_string().replace('"', "'")
            )
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_requests() {
        let put = Request::decode(r#"{"method":"PUT","queue":"q","message":"m"}"#).unwrap();
        assert_eq!(
            put,
            Request::Put {
                queue: "q".into(),
                message: "m".into()
            }
        );

        let get = Request::decode(r#"{"method":"GET","queue":"q"}"#).unwrap();
        assert_eq!(
            get,
            Request::Get {
                queue: "q".into(),
                timeout: None
            }
        );
        assert_eq!(get.method(), "GET");

        let stats = Request::decode(r#"{"method":"STATS","queue":"q"}"#).unwrap();
        assert_eq!(stats.queue(), "q");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        for line in [
            "not json",
            r#"{"method":"DELETE","queue":"q"}"#,
            r#"{"method":"PUT","queue":"q"}"#,
            r#"{"method":"GET","queue":""}"#,
            r#"{"method":"GET","queue":"q","timeout":-1}"#,
        ] {
            assert!(
                matches!(Request::decode(line), Err(ApiError::InvalidRequest(_))),
                "accepted {line}"
            );
        }
    }

    #[test]
    fn test_response_encoding_omits_empty_fields() {
        assert_eq!(Response::ok().encode(), "{\"status\":200}\n");
        assert_eq!(
            Response::with_message("hi".into()).encode(),
            "{\"status\":200,\"message\":\"hi\"}\n"
        );
        assert_eq!(
            Response::error(404, "gone").encode(),
            "{\"status\":404,\"error\":\"gone\"}\n"
        );
    }
}
