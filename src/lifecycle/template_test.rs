//! Tests for deep-copy templates.

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::lifecycle::{CloneError, CloneTemplate, FnTemplate, SerializedTemplate, Template};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        prefix: String,
        limits: Vec<u32>,
        #[serde(skip)]
        hits: u64,
    }

    fn settings() -> Settings {
        Settings {
            prefix: "row-".to_string(),
            limits: vec![1, 2, 3],
            hits: 99,
        }
    }

    #[test]
    fn test_serialized_template_produces_independent_copies() {
        let template = SerializedTemplate::new(&settings()).unwrap();
        assert!(template.encoded_len() > 0);

        let mut first = template.replicate().unwrap();
        let second = template.replicate().unwrap();
        first.limits.push(4);

        assert_eq!(first.prefix, "row-");
        assert_eq!(second.limits, vec![1, 2, 3]);
        assert_eq!(first.hits, 0, "skipped fields are not carried into copies");
    }

    /// Serializes fine but refuses to come back.
    #[derive(Debug)]
    struct OneWay;

    impl Serialize for OneWay {
        fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str("one-way")
        }
    }

    impl<'de> Deserialize<'de> for OneWay {
        fn deserialize<D: serde::Deserializer<'de>>(_: D) -> Result<Self, D::Error> {
            Err(serde::de::Error::custom("not reproducible"))
        }
    }

    #[test]
    fn test_serialized_template_rejects_non_reproducible_original() {
        let err = SerializedTemplate::new(&OneWay).err().unwrap();
        assert!(matches!(err, CloneError::Decode(_)));
        assert!(err.to_string().contains("decode copy"));
    }

    #[test]
    fn test_clone_template_keeps_original_untouched() {
        let template = CloneTemplate::new(settings());
        let mut copy = template.replicate().unwrap();
        copy.limits.clear();
        copy.hits = 0;

        let again = template.replicate().unwrap();
        assert_eq!(again, settings());
    }

    #[test]
    fn test_fn_template_calls_factory_per_copy() {
        let calls = AtomicUsize::new(0);
        let template = FnTemplate::new(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                Err(CloneError::msg("flaky"))
            } else {
                Ok(n)
            }
        });

        assert_eq!(template.replicate().unwrap(), 0);
        assert!(template.replicate().is_err());
        assert_eq!(template.replicate().unwrap(), 2);
    }
}
