use crate::constants::{PROCESS_LOG_KEY, SPCONF_DESCRIPTION, SPCONF_TAG};
use chrono::NaiveDate;
use rust_htslib::bcf::{self, header::HeaderView, HeaderRecord};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Info,
    Format,
    Filter,
    Contig,
    Structured,
    Generic,
}

/// Ordered `key=value` attributes of a structured header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Attributes(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    /// Description without its surrounding quotes.
    pub fn description(&self) -> Option<&str> {
        self.get("Description").map(unquote)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            if key == "Description" {
                write!(f, "{key}=\"{}\"", unquote(value))?;
            } else {
                write!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// One metadata line of a VCF header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Info(Attributes),
    Format(Attributes),
    Filter(Attributes),
    Contig(Attributes),
    Structured { key: String, attributes: Attributes },
    Generic { key: String, value: String },
}

impl Declaration {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Info(_) => DeclarationKind::Info,
            Declaration::Format(_) => DeclarationKind::Format,
            Declaration::Filter(_) => DeclarationKind::Filter,
            Declaration::Contig(_) => DeclarationKind::Contig,
            Declaration::Structured { .. } => DeclarationKind::Structured,
            Declaration::Generic { .. } => DeclarationKind::Generic,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Declaration::Info(_) => "INFO",
            Declaration::Format(_) => "FORMAT",
            Declaration::Filter(_) => "FILTER",
            Declaration::Contig(_) => "contig",
            Declaration::Structured { key, .. } | Declaration::Generic { key, .. } => key,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Declaration::Info(attributes)
            | Declaration::Format(attributes)
            | Declaration::Filter(attributes)
            | Declaration::Contig(attributes)
            | Declaration::Structured { attributes, .. } => Some(attributes),
            Declaration::Generic { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes().and_then(Attributes::id)
    }

    fn from_htslib(record: HeaderRecord) -> Self {
        fn collect<'a>(values: impl IntoIterator<Item = (&'a String, &'a String)>) -> Attributes {
            Attributes(
                values
                    .into_iter()
                    .filter(|(k, _)| k.as_str() != "IDX")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        }
        match record {
            HeaderRecord::Info { values, .. } => Declaration::Info(collect(values.iter())),
            HeaderRecord::Format { values, .. } => Declaration::Format(collect(values.iter())),
            HeaderRecord::Filter { values, .. } => Declaration::Filter(collect(values.iter())),
            HeaderRecord::Contig { values, .. } => Declaration::Contig(collect(values.iter())),
            HeaderRecord::Structured { key, values } => Declaration::Structured {
                key,
                attributes: collect(values.iter()),
            },
            HeaderRecord::Generic { key, value } => Declaration::Generic { key, value },
        }
    }

    /// Copy for the `n`-th allele of an MNV: `ID` gains `_n`, `Description` is annotated.
    pub fn positional_variant(&self, n: usize) -> Option<Self> {
        let mut attributes = self.attributes()?.clone();
        let id = attributes.id()?.to_string();
        let description = attributes.description().unwrap_or_default().to_string();
        attributes.set("ID", format!("{id}_{n}"));
        attributes.set(
            "Description",
            format!("{description} (MNV allele {n} in series)"),
        );
        match self {
            Declaration::Info(_) => Some(Declaration::Info(attributes)),
            Declaration::Format(_) => Some(Declaration::Format(attributes)),
            _ => None,
        }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Generic { key, value } => write!(f, "##{key}={value}"),
            _ => match self.attributes() {
                Some(attributes) => write!(f, "##{}=<{attributes}>", self.key()),
                None => write!(f, "##{}", self.key()),
            },
        }
    }
}

/// The metadata section of a VCF header, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderModel {
    declarations: Vec<Declaration>,
}

impl HeaderModel {
    pub fn from_view(view: &HeaderView) -> Self {
        HeaderModel {
            declarations: view
                .header_records()
                .into_iter()
                .map(Declaration::from_htslib)
                .collect(),
        }
    }

    pub fn from_declarations(declarations: Vec<Declaration>) -> Self {
        HeaderModel { declarations }
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn of_kind(&self, kind: DeclarationKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind() == kind)
    }

    pub fn find(&self, kind: DeclarationKind, id: &str) -> Option<&Declaration> {
        self.of_kind(kind).find(|d| d.id() == Some(id))
    }

    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.declarations
            .iter()
            .map(Declaration::key)
            .filter(move |key| key.starts_with(prefix))
    }

    pub fn push(&mut self, declaration: Declaration) {
        self.declarations.push(declaration);
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Pushes `declarations` onto an htslib header.
    pub fn apply_to(declarations: &[Declaration], header: &mut bcf::Header) {
        for declaration in declarations {
            header.push_record(declaration.to_string().as_bytes());
        }
    }
}

/// Inputs of the provenance line recorded by a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub input_name: String,
    pub source: String,
    pub params: String,
}

impl Provenance {
    pub fn value(&self) -> String {
        format!(
            "<InputVCF=<{}>,InputVCFSource=<{}>,InputVCFParam=<{}>>",
            self.input_name, self.source, self.params
        )
    }
}

/// Highest `.N` suffix among header keys starting with `prefix`.
pub fn last_process_index(model: &HeaderModel, prefix: &str) -> Option<u32> {
    model
        .keys_with_prefix(prefix)
        .filter_map(|key| key.rsplit_once('.'))
        .filter_map(|(_, index)| index.parse::<u32>().ok())
        .max()
}

/// Key for a new provenance line: the bare key unless indexed keys already exist, in
/// which case a date-qualified key with the next free index for that date.
pub fn process_log_key(model: &HeaderModel, date: NaiveDate) -> String {
    match last_process_index(model, PROCESS_LOG_KEY) {
        Some(index) if index > 0 => {
            let dated = format!("{PROCESS_LOG_KEY}_{}", date.format("%Y%m%d"));
            let next = last_process_index(model, &dated).unwrap_or(0) + 1;
            format!("{dated}.{next}")
        }
        _ => PROCESS_LOG_KEY.to_string(),
    }
}

fn spconf_declaration() -> Declaration {
    Declaration::Info(Attributes::new(&[
        ("ID", SPCONF_TAG),
        ("Number", "."),
        ("Type", "String"),
        ("Description", SPCONF_DESCRIPTION),
    ]))
}

/// `ID` ends in `_<n>` and the unsuffixed `ID` is declared with the same kind.
fn is_positional_variant(model: &HeaderModel, declaration: &Declaration) -> bool {
    let Some(id) = declaration.id() else {
        return false;
    };
    match id.rsplit_once('_') {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            model.find(declaration.kind(), base).is_some()
        }
        _ => false,
    }
}

/// Appends the provenance line, the `_1..=max_run_length` copies of every INFO and FORMAT
/// declaration, and the SPCONF declaration. Returns the declarations that were added.
pub fn rewrite(
    model: &mut HeaderModel,
    max_run_length: usize,
    provenance: &Provenance,
    date: NaiveDate,
) -> Vec<Declaration> {
    // The provenance value nests `<...>`, so it is written as a generic line.
    let mut added = vec![Declaration::Generic {
        key: process_log_key(model, date),
        value: provenance.value(),
    }];

    for kind in [DeclarationKind::Info, DeclarationKind::Format] {
        for declaration in model.of_kind(kind) {
            if declaration.id() == Some(SPCONF_TAG) || is_positional_variant(model, declaration) {
                continue;
            }
            for n in 1..=max_run_length {
                let Some(copy) = declaration.positional_variant(n) else {
                    continue;
                };
                let id = copy.id().unwrap_or_default();
                let declared = model.find(kind, id).is_some()
                    || added.iter().any(|d| d.kind() == kind && d.id() == Some(id));
                if !declared {
                    added.push(copy);
                }
            }
        }
    }

    if model.find(DeclarationKind::Info, SPCONF_TAG).is_none() {
        added.push(spconf_declaration());
    }

    log::debug!(
        "Header rewrite adds {} declaration(s) for runs of up to {max_run_length} allele(s)",
        added.len()
    );
    for declaration in &added {
        model.push(declaration.clone());
    }
    added
}
