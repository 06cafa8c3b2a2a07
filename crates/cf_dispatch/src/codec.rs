// crates/cf_dispatch/src/codec.rs

//! 线路编码
//!
//! 所有消息都包在带协议版本号的信封里，用 bincode 编码。bincode 对
//! 实数精确、输出确定，同一应答无论经本地还是经通道传输，字节完全一致。
//!
//! 信封布局：`version: u16 | body`。先单独解出版本号，版本不符时
//! 直接拒绝，不再尝试解析消息体。

use crate::message::{Call, Reply};
use cf_foundation::{CfError, CfResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 协议版本
pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u16,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    version: u16,
    body: T,
}

/// 编码任意消息
pub fn encode<T: Serialize>(message: &T) -> CfResult<Vec<u8>> {
    bincode::serialize(&EnvelopeRef {
        version: PROTOCOL_VERSION,
        body: message,
    })
    .map_err(|e| CfError::transport(format!("编码失败: {}", e)))
}

/// 解码任意消息
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CfResult<T> {
    let version: u16 = bincode::deserialize(bytes)
        .map_err(|e| CfError::transport(format!("无法读取协议版本: {}", e)))?;
    if version != PROTOCOL_VERSION {
        return Err(CfError::transport(format!(
            "协议版本不匹配: 期望 {}, 实际 {}",
            PROTOCOL_VERSION, version
        )));
    }
    let envelope: Envelope<T> = bincode::deserialize(bytes)
        .map_err(|e| CfError::transport(format!("解码失败: {}", e)))?;
    Ok(envelope.body)
}

/// 编码调用
pub fn encode_call(call: &Call) -> CfResult<Vec<u8>> {
    encode(call)
}

/// 解码调用
pub fn decode_call(bytes: &[u8]) -> CfResult<Call> {
    decode(bytes)
}

/// 编码应答
pub fn encode_reply(reply: &Reply) -> CfResult<Vec<u8>> {
    encode(reply)
}

/// 解码应答
pub fn decode_reply(bytes: &[u8]) -> CfResult<Reply> {
    decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CallId, TargetAddress};
    use cf_config::ArgumentFrame;
    use cf_foundation::{Uri, Value};

    fn sample_call() -> Call {
        let mut args = ArgumentFrame::new()
            .with("cfl", 0.1 + 0.2)
            .with("target", Uri::parse("/a/b").unwrap());
        args.map_mut("nested").set("weights", vec![1.5, f64::MIN_POSITIVE]);
        Call::new(
            TargetAddress::workers(Uri::parse("/solver").unwrap()),
            "solve",
            args,
        )
    }

    #[test]
    fn test_call_survives_encoding_exactly() {
        let call = sample_call();
        let decoded = decode_call(&encode_call(&call).unwrap()).unwrap();
        assert_eq!(decoded, call);
        assert_eq!(decoded.args.get("cfl"), Some(&Value::Real(0.1 + 0.2)));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let reply = Reply::failure(
            CallId::new(),
            "cpath:/solver",
            CfError::application("diverged", "cpath:/solver"),
        );
        assert_eq!(encode_reply(&reply).unwrap(), encode_reply(&reply.clone()).unwrap());
        assert_eq!(decode_reply(&encode_reply(&reply).unwrap()).unwrap(), reply);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut bytes = encode_call(&sample_call()).unwrap();
        bytes[0] = bytes[0].wrapping_add(1);
        let err = decode_call(&bytes).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_reply(&[]).unwrap_err().is_transport());
        let bytes = encode(&PROTOCOL_VERSION).unwrap();
        assert!(decode_reply(&bytes).unwrap_err().is_transport());
    }
}
