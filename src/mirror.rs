//! Schema Mirror
//!
//! Copies pinned subjects, and every subject they reference, from a remote
//! registry into a bundled tree the bootstrap can embed:
//!
//! ```text
//! schemas/
//! ├── 0/                      pinned subjects
//! │   └── orders-value/
//! │       └── schema.json
//! └── 1/                      subjects referenced from level 0
//!     └── common-money/
//!         └── schema.json
//! ```
//!
//! Each document is rewritten for a local registry: reference versions are
//! forced to 1, compatibility is set to FULL, and registry-assigned fields
//! are dropped.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RegistryEndpoint;
use crate::error::{BootstrapError, Result};
use crate::source::SCHEMA_FILE;

/// Only env keys with this prefix name subjects or versions
pub const PIN_PREFIX: &str = "KAFKA_SCHEMA_REGISTRY";

/// A root subject to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPin {
    pub subject: String,
    pub version: u32,
}

/// Build pins from env entries.
///
/// `KAFKA_SCHEMA_REGISTRY_ORDERS_KEY=orders-key` names a subject (version 1
/// unless pinned); `KAFKA_SCHEMA_REGISTRY_ORDERS_VERSION=3` pins the subject
/// stored under the matching `_KEY` entry. Keys mentioning `ENDPOINT` are
/// connection settings and skipped.
pub fn parse_pins<I>(entries: I) -> Result<Vec<SubjectPin>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut subjects: BTreeMap<String, String> = BTreeMap::new();
    let mut versions: BTreeMap<String, u32> = BTreeMap::new();

    for (key, value) in entries {
        let key = key.trim().to_string();
        let value = value.trim().to_string();
        if !key.starts_with(PIN_PREFIX) || key.contains("ENDPOINT") {
            continue;
        }

        if key.contains("VERSION") {
            let version = value.parse().map_err(|_| BootstrapError::InvalidPin {
                key: key.clone(),
                value: value.clone(),
            })?;
            versions.insert(key.replace("_VERSION", "_KEY"), version);
        } else {
            subjects.insert(key, value);
        }
    }

    for key in versions.keys().filter(|key| !subjects.contains_key(*key)) {
        warn!(key = %key, "version pin without a subject, ignoring");
    }

    Ok(subjects
        .into_iter()
        .map(|(key, subject)| SubjectPin {
            version: versions.get(&key).copied().unwrap_or(1),
            subject,
        })
        .collect())
}

/// Read pins from env files, later files overriding earlier ones
pub fn read_pin_files(paths: &[PathBuf]) -> Result<Vec<SubjectPin>> {
    let mut entries = Vec::new();
    for path in paths {
        for item in dotenvy::from_path_iter(path)? {
            entries.push(item?);
        }
    }
    parse_pins(entries)
}

/// Source of registry documents for the mirror
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    /// The registry's JSON for one subject version
    async fn fetch(&self, subject: &str, version: u32) -> Result<Value>;
}

/// Fetches subject versions from a remote registry over HTTP
pub struct HttpFetcher {
    base: RegistryEndpoint,
    http: Client,
}

impl HttpFetcher {
    pub fn new(base: RegistryEndpoint, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { base, http })
    }
}

#[async_trait]
impl SchemaFetcher for HttpFetcher {
    async fn fetch(&self, subject: &str, version: u32) -> Result<Value> {
        let version_segment = version.to_string();
        let url = self
            .base
            .join(["subjects", subject, "versions", version_segment.as_str()]);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::FetchStatus {
                subject: subject.to_string(),
                version,
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

/// A subject version named in a document's `references`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub subject: String,
    pub version: u32,
}

/// Extract `references[].subject` / `references[].version`
pub fn references(document: &Value, subject: &str) -> Result<Vec<Reference>> {
    let Some(items) = document.get("references").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .map(|item| {
            let reference_subject = item.get("subject").and_then(Value::as_str);
            let version = item
                .get("version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok());

            match (reference_subject, version) {
                (Some(s), Some(v)) => Ok(Reference {
                    subject: s.to_string(),
                    version: v,
                }),
                _ => Err(BootstrapError::InvalidDocument {
                    subject: subject.to_string(),
                    reason: format!("malformed reference {}", item),
                }),
            }
        })
        .collect()
}

/// Rewrite a fetched document for registration on a local registry
pub fn rewrite_document(document: Value, subject: &str) -> Result<Value> {
    let Value::Object(mut fields) = document else {
        return Err(BootstrapError::InvalidDocument {
            subject: subject.to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };

    // Local registries only ever hold version 1 of each subject
    if let Some(Value::Array(items)) = fields.get_mut("references") {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            item.insert("version".to_string(), Value::from(1));
        }
    }

    fields.insert("compatibility_level".to_string(), Value::from("FULL"));
    fields.insert("subject_name".to_string(), Value::from(subject));
    for registry_field in ["subject", "version", "id"] {
        fields.shift_remove(registry_field);
    }

    Ok(Value::Object(fields))
}

/// Tab-indented JSON, no trailing newline
pub fn render_document(document: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    Ok(buf)
}

/// A document written by the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredSchema {
    pub subject: String,
    pub depth: usize,
    pub path: PathBuf,
}

/// Everything a mirror run wrote, in write order
#[derive(Debug, Clone, Default)]
pub struct MirrorReport {
    pub written: Vec<MirroredSchema>,
}

/// Writes pinned subjects and their references into a bundled tree
pub struct Mirror<F> {
    fetcher: F,
    output_dir: PathBuf,
    max_depth: usize,
}

impl<F: SchemaFetcher> Mirror<F> {
    pub fn new(fetcher: F, output_dir: impl AsRef<Path>, max_depth: usize) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.as_ref().to_path_buf(),
            max_depth,
        }
    }

    /// Remove levels `0..max_depth` left over from a previous run
    pub fn clean(&self) -> Result<()> {
        info!(output = %self.output_dir.display(), depth = self.max_depth, "cleaning up existing levels");
        for level in 0..self.max_depth {
            let dir = self.output_dir.join(level.to_string());
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed level"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Mirror every pin at level 0 and its references below it
    pub async fn mirror_all(&self, pins: &[SubjectPin]) -> Result<MirrorReport> {
        let mut report = MirrorReport::default();
        for pin in pins {
            info!(subject = %pin.subject, version = pin.version, "mirroring subject");
            let mut chain = Vec::new();
            self.mirror_subject(pin.subject.clone(), pin.version, 0, &mut chain, &mut report)
                .await?;
        }
        Ok(report)
    }

    /// References are written before the document that names them. `chain`
    /// holds the subjects currently being resolved, root first.
    fn mirror_subject<'a>(
        &'a self,
        subject: String,
        version: u32,
        depth: usize,
        chain: &'a mut Vec<String>,
        report: &'a mut MirrorReport,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if let Some(start) = chain.iter().position(|s| *s == subject) {
                let mut cycle = chain[start..].to_vec();
                cycle.push(subject);
                return Err(BootstrapError::ReferenceCycle(cycle));
            }
            if depth >= self.max_depth {
                return Err(BootstrapError::ReferenceDepthExceeded {
                    subject,
                    limit: self.max_depth,
                });
            }

            let dir = self.output_dir.join(depth.to_string()).join(&subject);
            fs::create_dir_all(&dir)?;

            let document = self.fetcher.fetch(&subject, version).await?;

            chain.push(subject.clone());
            for reference in references(&document, &subject)? {
                debug!(subject = %subject, reference = %reference.subject, "following reference");
                self.mirror_subject(reference.subject, reference.version, depth + 1, chain, report)
                    .await?;
            }
            chain.pop();

            let rewritten = rewrite_document(document, &subject)?;
            let path = dir.join(SCHEMA_FILE);
            fs::write(&path, render_document(&rewritten)?)?;
            info!(subject = %subject, depth, path = %path.display(), "wrote schema");

            report.written.push(MirroredSchema {
                subject,
                depth,
                path,
            });
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Registry documents keyed by subject; records every fetch
    #[derive(Default)]
    struct FakeFetcher {
        documents: HashMap<String, Value>,
        fetched: Mutex<Vec<(String, u32)>>,
    }

    impl FakeFetcher {
        fn with(mut self, subject: &str, references: &[(&str, u32)]) -> Self {
            let refs: Vec<Value> = references
                .iter()
                .map(|(s, v)| json!({ "name": format!("com.example.{}", s), "subject": s, "version": v }))
                .collect();
            self.documents.insert(
                subject.to_string(),
                json!({
                    "subject": subject,
                    "version": 7,
                    "id": 1042,
                    "schema": "{\"type\":\"string\"}",
                    "references": refs,
                }),
            );
            self
        }
    }

    #[async_trait]
    impl SchemaFetcher for FakeFetcher {
        async fn fetch(&self, subject: &str, version: u32) -> Result<Value> {
            self.fetched
                .lock()
                .unwrap()
                .push((subject.to_string(), version));
            self.documents
                .get(subject)
                .cloned()
                .ok_or_else(|| BootstrapError::FetchStatus {
                    subject: subject.to_string(),
                    version,
                    status: 404,
                })
        }
    }

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_pins() {
        let pins = parse_pins(entries(&[
            ("KAFKA_SCHEMA_REGISTRY_ENDPOINT", "http://localhost:8081"),
            ("KAFKA_SCHEMA_REGISTRY_ORDERS_KEY", "orders-value"),
            ("KAFKA_SCHEMA_REGISTRY_PAYMENTS_KEY", "payments-value"),
            ("KAFKA_BROKERS", "localhost:9092"),
            ("KAFKA_SCHEMA_REGISTRY_ORDERS_VERSION", "4"),
        ]))
        .unwrap();

        assert_eq!(
            pins,
            vec![
                SubjectPin {
                    subject: "orders-value".to_string(),
                    version: 4
                },
                SubjectPin {
                    subject: "payments-value".to_string(),
                    version: 1
                },
            ]
        );
    }

    #[test]
    fn test_parse_pins_version_before_subject() {
        let pins = parse_pins(entries(&[
            ("KAFKA_SCHEMA_REGISTRY_ORDERS_VERSION", "2"),
            ("KAFKA_SCHEMA_REGISTRY_ORDERS_KEY", "orders-value"),
            ("KAFKA_SCHEMA_REGISTRY_GHOST_VERSION", "9"),
        ]))
        .unwrap();

        assert_eq!(
            pins,
            vec![SubjectPin {
                subject: "orders-value".to_string(),
                version: 2
            }]
        );
    }

    #[test]
    fn test_parse_pins_invalid_version() {
        let err = parse_pins(entries(&[("KAFKA_SCHEMA_REGISTRY_ORDERS_VERSION", "latest")]));
        assert!(matches!(err, Err(BootstrapError::InvalidPin { .. })));
    }

    #[test]
    fn test_read_pin_files_in_order() {
        let dir = tempdir().unwrap();
        let local = dir.path().join(".local.env");
        let versions = dir.path().join(".schema-versions.env");
        fs::write(
            &local,
            "# local stack\nKAFKA_SCHEMA_REGISTRY_ENDPOINT=http://localhost:8081\nKAFKA_SCHEMA_REGISTRY_ORDERS_KEY=orders-value\n",
        )
        .unwrap();
        fs::write(&versions, "KAFKA_SCHEMA_REGISTRY_ORDERS_VERSION=3\n").unwrap();

        let pins = read_pin_files(&[local, versions]).unwrap();
        assert_eq!(
            pins,
            vec![SubjectPin {
                subject: "orders-value".to_string(),
                version: 3
            }]
        );
    }

    #[test]
    fn test_read_pin_files_missing() {
        let dir = tempdir().unwrap();
        let err = read_pin_files(&[dir.path().join("absent.env")]);
        assert!(matches!(err, Err(BootstrapError::EnvFile(_))));
    }

    #[test]
    fn test_rewrite_document() {
        let document = json!({
            "subject": "orders-value",
            "version": 12,
            "id": 100231,
            "schemaType": "AVRO",
            "references": [
                { "name": "com.example.Money", "subject": "common-money", "version": 5 },
                { "name": "com.example.Address", "subject": "common-address", "version": 2 }
            ],
            "schema": "{}"
        });

        let rewritten = rewrite_document(document, "orders-value").unwrap();

        assert_eq!(
            rewritten,
            json!({
                "schemaType": "AVRO",
                "references": [
                    { "name": "com.example.Money", "subject": "common-money", "version": 1 },
                    { "name": "com.example.Address", "subject": "common-address", "version": 1 }
                ],
                "schema": "{}",
                "compatibility_level": "FULL",
                "subject_name": "orders-value"
            })
        );
        let keys: Vec<&String> = rewritten.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["schemaType", "references", "schema", "compatibility_level", "subject_name"]
        );
    }

    #[test]
    fn test_rewrite_rejects_non_object() {
        let err = rewrite_document(json!(["not", "a", "schema"]), "x");
        assert!(matches!(err, Err(BootstrapError::InvalidDocument { .. })));
    }

    #[test]
    fn test_render_uses_tabs() {
        let rendered = render_document(&json!({ "a": [1], "b": "c" })).unwrap();
        assert_eq!(
            String::from_utf8(rendered).unwrap(),
            "{\n\t\"a\": [\n\t\t1\n\t],\n\t\"b\": \"c\"\n}"
        );
    }

    #[test]
    fn test_malformed_reference() {
        let document = json!({ "references": [{ "name": "x" }] });
        assert!(matches!(
            references(&document, "orders-value"),
            Err(BootstrapError::InvalidDocument { .. })
        ));
        assert!(references(&json!({}), "orders-value").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mirror_writes_references_deeper() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .with("orders-value", &[("common-money", 5)])
            .with("common-money", &[("common-currency", 2)])
            .with("common-currency", &[]);
        let mirror = Mirror::new(fetcher, dir.path(), 5);

        let report = mirror
            .mirror_all(&[SubjectPin {
                subject: "orders-value".to_string(),
                version: 3,
            }])
            .await
            .unwrap();

        let written: Vec<(&str, usize)> = report
            .written
            .iter()
            .map(|w| (w.subject.as_str(), w.depth))
            .collect();
        assert_eq!(
            written,
            vec![("common-currency", 2), ("common-money", 1), ("orders-value", 0)]
        );
        assert_eq!(
            *mirror.fetcher.fetched.lock().unwrap(),
            vec![
                ("orders-value".to_string(), 3),
                ("common-money".to_string(), 5),
                ("common-currency".to_string(), 2),
            ]
        );

        let content = fs::read_to_string(dir.path().join("0/orders-value/schema.json")).unwrap();
        let document: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(document["subject_name"], "orders-value");
        assert_eq!(document["references"][0]["version"], 1);
        assert!(document.get("id").is_none());
    }

    #[tokio::test]
    async fn test_mirror_detects_cycle() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .with("a", &[("b", 1)])
            .with("b", &[("c", 1)])
            .with("c", &[("a", 1)]);
        let mirror = Mirror::new(fetcher, dir.path(), 10);

        let err = mirror
            .mirror_all(&[SubjectPin {
                subject: "a".to_string(),
                version: 1,
            }])
            .await
            .unwrap_err();

        match err {
            BootstrapError::ReferenceCycle(cycle) => assert_eq!(cycle, vec!["a", "b", "c", "a"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mirror_shared_reference_is_not_a_cycle() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .with("orders-value", &[("common-money", 1), ("common-address", 1)])
            .with("common-address", &[("common-money", 1)])
            .with("common-money", &[]);
        let mirror = Mirror::new(fetcher, dir.path(), 5);

        let report = mirror
            .mirror_all(&[SubjectPin {
                subject: "orders-value".to_string(),
                version: 1,
            }])
            .await
            .unwrap();

        assert_eq!(report.written.len(), 4);
        assert!(dir.path().join("1/common-money/schema.json").exists());
        assert!(dir.path().join("2/common-money/schema.json").exists());
    }

    #[tokio::test]
    async fn test_mirror_depth_limit() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .with("a", &[("b", 1)])
            .with("b", &[]);
        let mirror = Mirror::new(fetcher, dir.path(), 1);

        let err = mirror
            .mirror_all(&[SubjectPin {
                subject: "a".to_string(),
                version: 1,
            }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::ReferenceDepthExceeded { ref subject, limit: 1 } if subject == "b"
        ));
    }

    #[tokio::test]
    async fn test_mirror_fetch_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let mirror = Mirror::new(FakeFetcher::default(), dir.path(), 5);

        let err = mirror
            .mirror_all(&[SubjectPin {
                subject: "missing".to_string(),
                version: 1,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::FetchStatus { status: 404, .. }));
    }

    #[test]
    fn test_clean_removes_levels_only() {
        let dir = tempdir().unwrap();
        for level in ["0", "1", "4", "9"] {
            fs::create_dir_all(dir.path().join(level).join("x")).unwrap();
        }
        fs::write(dir.path().join("README.md"), "bundle").unwrap();

        Mirror::new(FakeFetcher::default(), dir.path(), 5)
            .clean()
            .unwrap();

        assert!(!dir.path().join("0").exists());
        assert!(!dir.path().join("4").exists());
        assert!(dir.path().join("9").exists());
        assert!(dir.path().join("README.md").exists());
    }
}
