//! Kubo's RPC encodes pub/sub topic names and message payloads as multibase
//! base64url without padding (`u` prefix). Only that base is supported here;
//! it is the only one current Kubo emits.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub fn encode(data: &[u8]) -> String {
    format!("u{}", URL_SAFE_NO_PAD.encode(data))
}

pub fn decode(s: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = s.strip_prefix('u') else {
        return Err(format!("unsupported multibase prefix in {s:?}"));
    };
    URL_SAFE_NO_PAD
        .decode(rest)
        .map_err(|e| format!("invalid base64url payload: {e}"))
}
