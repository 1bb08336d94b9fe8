//! Text-safe payload encoding (standard base64 with padding)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{Result, StreamError};

/// Encode arbitrary bytes as base64 text.
///
/// The output alphabet never contains the wire delimiter.
pub fn to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text, failing on non-alphabet characters or bad padding.
pub fn from_text(text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text).map_err(|e| StreamError::decode("payload text", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn text_round_trips_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let text = to_text(&bytes);
            prop_assert!(!text.contains('\n'));
            prop_assert_eq!(from_text(&text).unwrap(), bytes);
        }
    }

    #[test]
    fn rejects_non_alphabet_characters() {
        let err = from_text("###notbase64###").unwrap_err();
        assert!(matches!(err, StreamError::Decode { .. }));
        assert!(err.to_string().contains("payload text"));
    }

    #[test]
    fn rejects_bad_padding() {
        assert!(from_text("QUJD=").is_err());
        assert!(from_text("QQ").is_err());
        assert_eq!(from_text("QQ==").unwrap(), b"A");
    }
}
