//! Explicit field-mapping tables between model records and store hashes.
//!
//! Each record type lists the fields it writes and reads by name. The
//! `_v` field stamps the schema version so a reader refuses records written
//! by a newer layout instead of silently misreading them.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use scanmesh_model::{
    BruteModuleConfig, GroupId, KeywordModuleConfig, Module, NsModuleConfig,
    OrgId, PortModuleConfig, ScanGroup, ScanGroupAddress, WebModuleConfig,
};

use crate::error::{CoordError, Result};

pub(crate) type FieldMap = HashMap<String, String>;

pub(crate) const VERSION_FIELD: &str = "_v";

pub(crate) trait HashRecord: Sized {
    const SCHEMA_VERSION: u32;

    fn write_fields(&self, out: &mut FieldWriter);

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self>;
}

/// A module sub-configuration: one hash plus zero or more ordered lists.
pub(crate) trait ModuleRecord: HashRecord + Default {
    const MODULE: Module;
    const LIST_FIELDS: &'static [&'static str];

    fn list_values(&self, field: &str) -> Vec<String>;

    fn set_list(
        &mut self,
        key: &str,
        field: &str,
        values: Vec<String>,
    ) -> Result<()>;
}

pub(crate) fn encode<R: HashRecord>(record: &R) -> Vec<(String, String)> {
    let mut out = FieldWriter::default();
    out.put(VERSION_FIELD, R::SCHEMA_VERSION);
    record.write_fields(&mut out);
    out.fields
}

pub(crate) fn decode<R: HashRecord>(key: &str, fields: &FieldMap) -> Result<R> {
    let reader = FieldReader { key, fields };
    let version: u32 = reader.opt(VERSION_FIELD)?;
    if version > R::SCHEMA_VERSION {
        return Err(CoordError::decode(
            key,
            format!(
                "schema version {version} is newer than supported {}",
                R::SCHEMA_VERSION
            ),
        ));
    }
    R::read_fields(&reader)
}

#[derive(Debug, Default)]
pub(crate) struct FieldWriter {
    fields: Vec<(String, String)>,
}

impl FieldWriter {
    fn put(&mut self, name: &str, value: impl ToString) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    fn flag(&mut self, name: &str, value: bool) {
        self.put(name, if value { "1" } else { "0" });
    }

    fn time(&mut self, name: &str, value: Option<DateTime<Utc>>) {
        if let Some(value) = value {
            self.put(name, value.to_rfc3339_opts(SecondsFormat::Nanos, true));
        }
    }
}

#[derive(Debug)]
pub(crate) struct FieldReader<'a> {
    key: &'a str,
    fields: &'a FieldMap,
}

impl FieldReader<'_> {
    fn req<T: FromStr>(&self, name: &str) -> Result<T> {
        let raw = self.fields.get(name).ok_or_else(|| {
            CoordError::decode(self.key, format!("missing field {name}"))
        })?;
        self.parse(name, raw)
    }

    fn opt<T: FromStr + Default>(&self, name: &str) -> Result<T> {
        match self.fields.get(name) {
            Some(raw) if !raw.is_empty() => self.parse(name, raw),
            _ => Ok(T::default()),
        }
    }

    fn string(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn flag(&self, name: &str) -> Result<bool> {
        match self.fields.get(name).map(String::as_str) {
            None | Some("") | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(CoordError::decode(
                self.key,
                format!("field {name} is not a flag: {other}"),
            )),
        }
    }

    /// RFC 3339 with nanoseconds. Version 1 records hold epoch milliseconds.
    fn time(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = match self.fields.get(name) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        if let Ok(ms) = raw.parse::<i64>() {
            return DateTime::from_timestamp_millis(ms).map(Some).ok_or_else(|| {
                CoordError::decode(
                    self.key,
                    format!("field {name} is out of range: {ms}"),
                )
            });
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|time| Some(time.with_timezone(&Utc)))
            .map_err(|err| {
                CoordError::decode(
                    self.key,
                    format!("field {name} is not a timestamp: {err}"),
                )
            })
    }

    fn parse<T: FromStr>(&self, name: &str, raw: &str) -> Result<T> {
        raw.parse().map_err(|_| {
            CoordError::decode(self.key, format!("field {name} has bad value {raw}"))
        })
    }
}

fn parse_ints(key: &str, field: &str, values: Vec<String>) -> Result<Vec<i32>> {
    values
        .into_iter()
        .map(|raw| {
            raw.parse().map_err(|_| {
                CoordError::decode(key, format!("list {field} has bad entry {raw}"))
            })
        })
        .collect()
}

fn format_ints(values: &[i32]) -> Vec<String> {
    values.iter().map(i32::to_string).collect()
}

impl HashRecord for ScanGroup {
    const SCHEMA_VERSION: u32 = 2;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("org_id", self.org_id);
        out.put("group_id", self.group_id);
        out.put("group_name", &self.group_name);
        out.time("creation_time", Some(self.creation_time));
        out.put("created_by", &self.created_by);
        out.put("created_by_id", self.created_by_id);
        out.put("modified_by", &self.modified_by);
        out.put("modified_by_id", self.modified_by_id);
        out.time("modified_time", Some(self.modified_time));
        out.put("original_input_url", &self.original_input_url);
        out.flag("paused", self.paused);
        out.flag("deleted", self.deleted);
        out.time("last_paused_time", self.last_paused_time);
        out.put("archive_after_days", self.archive_after_days);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        let required_time = |name: &str| -> Result<DateTime<Utc>> {
            fields.time(name)?.ok_or_else(|| {
                CoordError::decode(fields.key, format!("missing field {name}"))
            })
        };

        Ok(ScanGroup {
            org_id: OrgId(fields.req("org_id")?),
            group_id: GroupId(fields.req("group_id")?),
            group_name: fields.string("group_name"),
            creation_time: required_time("creation_time")?,
            created_by: fields.string("created_by"),
            created_by_id: fields.opt("created_by_id")?,
            modified_by: fields.string("modified_by"),
            modified_by_id: fields.opt("modified_by_id")?,
            modified_time: required_time("modified_time")?,
            original_input_url: fields.string("original_input_url"),
            paused: fields.flag("paused")?,
            deleted: fields.flag("deleted")?,
            last_paused_time: fields.time("last_paused_time")?,
            archive_after_days: fields.opt("archive_after_days")?,
            modules: None,
        })
    }
}

impl HashRecord for ScanGroupAddress {
    const SCHEMA_VERSION: u32 = 2;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("address_id", self.address_id);
        out.put("org_id", self.org_id);
        out.put("group_id", self.group_id);
        out.put("host_address", &self.host_address);
        out.put("ip_address", &self.ip_address);
        out.time("discovery_time", self.discovery_time);
        out.put("discovered_by", &self.discovered_by);
        out.time("last_scanned_time", self.last_scanned_time);
        out.time("last_seen_time", self.last_seen_time);
        out.put("confidence_score", self.confidence_score);
        out.put("user_confidence_score", self.user_confidence_score);
        out.flag("is_soa", self.is_soa);
        out.flag("is_wildcard_zone", self.is_wildcard_zone);
        out.flag("is_hosted_service", self.is_hosted_service);
        out.flag("ignored", self.ignored);
        out.put("found_from", &self.found_from);
        out.put("ns_record", self.ns_record);
        out.put("address_hash", &self.address_hash);
        out.flag("deleted", self.deleted);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        Ok(ScanGroupAddress {
            address_id: fields.opt("address_id")?,
            org_id: OrgId(fields.req("org_id")?),
            group_id: GroupId(fields.req("group_id")?),
            host_address: fields.string("host_address"),
            ip_address: fields.string("ip_address"),
            discovery_time: fields.time("discovery_time")?,
            discovered_by: fields.string("discovered_by"),
            last_scanned_time: fields.time("last_scanned_time")?,
            last_seen_time: fields.time("last_seen_time")?,
            confidence_score: fields.opt("confidence_score")?,
            user_confidence_score: fields.opt("user_confidence_score")?,
            is_soa: fields.flag("is_soa")?,
            is_wildcard_zone: fields.flag("is_wildcard_zone")?,
            is_hosted_service: fields.flag("is_hosted_service")?,
            ignored: fields.flag("ignored")?,
            found_from: fields.string("found_from"),
            ns_record: fields.opt("ns_record")?,
            address_hash: fields.string("address_hash"),
            deleted: fields.flag("deleted")?,
        })
    }
}

impl HashRecord for NsModuleConfig {
    const SCHEMA_VERSION: u32 = 1;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("requests_per_second", self.requests_per_second);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        Ok(NsModuleConfig {
            requests_per_second: fields.opt("requests_per_second")?,
        })
    }
}

impl ModuleRecord for NsModuleConfig {
    const MODULE: Module = Module::Ns;
    const LIST_FIELDS: &'static [&'static str] = &[];

    fn list_values(&self, _field: &str) -> Vec<String> {
        Vec::new()
    }

    fn set_list(&mut self, _key: &str, _field: &str, _values: Vec<String>) -> Result<()> {
        Ok(())
    }
}

impl HashRecord for BruteModuleConfig {
    const SCHEMA_VERSION: u32 = 1;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("requests_per_second", self.requests_per_second);
        out.put("max_depth", self.max_depth);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        Ok(BruteModuleConfig {
            requests_per_second: fields.opt("requests_per_second")?,
            max_depth: fields.opt("max_depth")?,
            custom_subnames: Vec::new(),
        })
    }
}

impl ModuleRecord for BruteModuleConfig {
    const MODULE: Module = Module::Brute;
    const LIST_FIELDS: &'static [&'static str] = &["custom_subnames"];

    fn list_values(&self, field: &str) -> Vec<String> {
        match field {
            "custom_subnames" => self.custom_subnames.clone(),
            _ => Vec::new(),
        }
    }

    fn set_list(&mut self, _key: &str, field: &str, values: Vec<String>) -> Result<()> {
        if field == "custom_subnames" {
            self.custom_subnames = values;
        }
        Ok(())
    }
}

impl HashRecord for PortModuleConfig {
    const SCHEMA_VERSION: u32 = 1;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("requests_per_second", self.requests_per_second);
        out.flag("port_scan_enabled", self.port_scan_enabled);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        Ok(PortModuleConfig {
            requests_per_second: fields.opt("requests_per_second")?,
            port_scan_enabled: fields.flag("port_scan_enabled")?,
            ..Default::default()
        })
    }
}

impl ModuleRecord for PortModuleConfig {
    const MODULE: Module = Module::Port;
    const LIST_FIELDS: &'static [&'static str] = &[
        "custom_ports",
        "custom_web_ports",
        "allowed_tlds",
        "allowed_hosts",
        "disallowed_tlds",
        "disallowed_hosts",
    ];

    fn list_values(&self, field: &str) -> Vec<String> {
        match field {
            "custom_ports" => format_ints(&self.custom_ports),
            "custom_web_ports" => format_ints(&self.custom_web_ports),
            "allowed_tlds" => self.allowed_tlds.clone(),
            "allowed_hosts" => self.allowed_hosts.clone(),
            "disallowed_tlds" => self.disallowed_tlds.clone(),
            "disallowed_hosts" => self.disallowed_hosts.clone(),
            _ => Vec::new(),
        }
    }

    fn set_list(&mut self, key: &str, field: &str, values: Vec<String>) -> Result<()> {
        match field {
            "custom_ports" => self.custom_ports = parse_ints(key, field, values)?,
            "custom_web_ports" => {
                self.custom_web_ports = parse_ints(key, field, values)?
            }
            "allowed_tlds" => self.allowed_tlds = values,
            "allowed_hosts" => self.allowed_hosts = values,
            "disallowed_tlds" => self.disallowed_tlds = values,
            "disallowed_hosts" => self.disallowed_hosts = values,
            _ => {}
        }
        Ok(())
    }
}

impl HashRecord for WebModuleConfig {
    const SCHEMA_VERSION: u32 = 1;

    fn write_fields(&self, out: &mut FieldWriter) {
        out.put("requests_per_second", self.requests_per_second);
        out.put("max_links", self.max_links);
        out.flag("take_screenshots", self.take_screenshots);
        out.flag("extract_js", self.extract_js);
        out.flag("fingerprint_frameworks", self.fingerprint_frameworks);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Result<Self> {
        Ok(WebModuleConfig {
            requests_per_second: fields.opt("requests_per_second")?,
            max_links: fields.opt("max_links")?,
            take_screenshots: fields.flag("take_screenshots")?,
            extract_js: fields.flag("extract_js")?,
            fingerprint_frameworks: fields.flag("fingerprint_frameworks")?,
        })
    }
}

impl ModuleRecord for WebModuleConfig {
    const MODULE: Module = Module::Web;
    const LIST_FIELDS: &'static [&'static str] = &[];

    fn list_values(&self, _field: &str) -> Vec<String> {
        Vec::new()
    }

    fn set_list(&mut self, _key: &str, _field: &str, _values: Vec<String>) -> Result<()> {
        Ok(())
    }
}

impl HashRecord for KeywordModuleConfig {
    const SCHEMA_VERSION: u32 = 1;

    // The keyword module has no scalar settings; the hash only carries `_v`.
    fn write_fields(&self, _out: &mut FieldWriter) {}

    fn read_fields(_fields: &FieldReader<'_>) -> Result<Self> {
        Ok(KeywordModuleConfig::default())
    }
}

impl ModuleRecord for KeywordModuleConfig {
    const MODULE: Module = Module::Keyword;
    const LIST_FIELDS: &'static [&'static str] = &["keywords"];

    fn list_values(&self, field: &str) -> Vec<String> {
        match field {
            "keywords" => self.keywords.clone(),
            _ => Vec::new(),
        }
    }

    fn set_list(&mut self, _key: &str, field: &str, values: Vec<String>) -> Result<()> {
        if field == "keywords" {
            self.keywords = values;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_map(fields: Vec<(String, String)>) -> FieldMap {
        fields.into_iter().collect()
    }

    #[test]
    fn address_fields_survive_a_store_hash() {
        let mut addr = ScanGroupAddress {
            address_id: 12,
            org_id: OrgId(1),
            group_id: GroupId(2),
            host_address: "www.example.com".into(),
            ip_address: "93.184.216.34".into(),
            discovery_time: DateTime::from_timestamp_millis(1_700_000_000_123),
            discovered_by: "input_list".into(),
            confidence_score: 87.5,
            is_soa: true,
            ns_record: 1,
            ..Default::default()
        };
        addr.ensure_hash();

        let decoded: ScanGroupAddress =
            decode("k", &to_map(encode(&addr))).expect("decode address");
        assert_eq!(decoded, addr);
    }

    #[test]
    fn times_keep_sub_millisecond_precision() {
        let seen = DateTime::from_timestamp(1_792_306_680, 483_381_185)
            .expect("valid instant");
        let addr = ScanGroupAddress {
            host_address: "api.example.com".into(),
            last_seen_time: Some(seen),
            ..Default::default()
        };

        let fields = to_map(encode(&addr));
        assert_eq!(fields["last_seen_time"], "2026-10-18T06:58:00.483381185Z");
        let decoded: ScanGroupAddress =
            decode("k", &fields).expect("decode address");
        assert_eq!(decoded.last_seen_time, Some(seen));
    }

    #[test]
    fn version_one_millisecond_times_still_decode() {
        let mut fields = FieldMap::new();
        fields.insert(VERSION_FIELD.into(), "1".into());
        fields.insert("last_seen_time".into(), "1700000000123".into());

        let decoded: ScanGroupAddress =
            decode("k", &fields).expect("decode legacy address");
        assert_eq!(
            decoded.last_seen_time,
            DateTime::from_timestamp_millis(1_700_000_000_123)
        );

        fields.insert("last_seen_time".into(), "yesterday".into());
        assert!(decode::<ScanGroupAddress>("k", &fields).is_err());
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let mut fields = to_map(encode(&NsModuleConfig {
            requests_per_second: 10,
        }));
        fields.insert(VERSION_FIELD.into(), "99".into());

        let err = decode::<NsModuleConfig>("1:1:ns:config", &fields)
            .expect_err("future schema must not decode");
        assert!(matches!(err, CoordError::Decode { .. }));
    }

    #[test]
    fn missing_scalar_fields_fall_back_to_defaults() {
        let web: WebModuleConfig =
            decode("k", &FieldMap::new()).expect("empty hash decodes");
        assert_eq!(web, WebModuleConfig::default());
    }

    #[test]
    fn malformed_flag_is_a_decode_error() {
        let mut fields = FieldMap::new();
        fields.insert("extract_js".into(), "maybe".into());
        assert!(decode::<WebModuleConfig>("k", &fields).is_err());
    }

    #[test]
    fn port_lists_parse_integers() {
        let mut port = PortModuleConfig::default();
        port.set_list("k", "custom_ports", vec!["22".into(), "8443".into()])
            .expect("valid ports");
        assert_eq!(port.custom_ports, vec![22, 8443]);
        assert_eq!(port.list_values("custom_ports"), vec!["22", "8443"]);
        assert!(
            port.set_list("k", "custom_web_ports", vec!["http".into()])
                .is_err()
        );
    }
}
