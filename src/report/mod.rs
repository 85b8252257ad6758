//! Provenance records sent to the inspector.
//!
//! A [`Report`] describes what one instrumented instance, or one render-prop
//! result inside it, computed during a single render: which instance, which
//! property, and with which props, variables and variants.
//!
//! Reports are immutable and cheap to clone. A new report is built on every
//! render; nothing is ever updated in place.
//!
//! # Parent links
//!
//! Reports derived from another report through [`merge_variables`] keep a
//! back-reference to it, so an inspector can reconstruct where inherited
//! variables came from. The link exists only to read the parent's variables.
//! Do not hold on to a report for longer than the render pass that produced
//! it, otherwise every ancestor in its chain stays alive with it.

mod iter;

use core::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use triomphe::Arc;

pub use self::iter::Ancestors;

/// Sentinel property name of an instance's own report.
pub const COMPOSITION: &str = "COMPOSITION";

/// Component props, in insertion order.
pub type Props = IndexMap<String, Value>;

/// Variables visible to an instance, in insertion order.
pub type Vars = IndexMap<String, Value>;

/// Variables shared between a report and the reports derived from it.
pub type SharedVars = Arc<Vars>;

/// The property a report describes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyName {
    /// The instance itself.
    Composition,
    /// A named sub-property, such as a render-prop result.
    Property(String),
}

impl PropertyName {
    /// The wire name of this property.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Composition => COMPOSITION,
            Self::Property(name) => name,
        }
    }

    /// Whether this is the [`COMPOSITION`] sentinel.
    pub fn is_composition(&self) -> bool {
        matches!(self, Self::Composition)
    }
}

impl From<&str> for PropertyName {
    fn from(name: &str) -> Self {
        if name == COMPOSITION {
            Self::Composition
        } else {
            Self::Property(name.to_owned())
        }
    }
}

impl From<String> for PropertyName {
    fn from(name: String) -> Self {
        if name == COMPOSITION {
            Self::Composition
        } else {
            Self::Property(name)
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ReportData {
    instance_id: String,
    property_name: PropertyName,
    props: Option<Props>,
    vars: Option<SharedVars>,
    variants: Option<Value>,
    parent: Option<Report>,
}

/// An immutable provenance record.
#[derive(Clone, Debug)]
pub struct Report(Arc<ReportData>);

impl Report {
    /// Builds the own report of an instance, with
    /// [`PropertyName::Composition`] as its property.
    ///
    /// ```
    /// use clutch_report::report::{Props, Report};
    /// use serde_json::json;
    ///
    /// let mut props = Props::new();
    /// props.insert("label".into(), json!("Save"));
    ///
    /// let report = Report::own("button", Some(props), None, Some(json!({ "size": "lg" })));
    /// assert!(report.property_name().is_composition());
    /// assert!(report.parent().is_none());
    /// ```
    pub fn own(
        instance_id: impl Into<String>,
        props: Option<Props>,
        vars: Option<SharedVars>,
        variants: Option<Value>,
    ) -> Self {
        Self(Arc::new(ReportData {
            instance_id: instance_id.into(),
            property_name: PropertyName::Composition,
            props,
            vars,
            variants,
            parent: None,
        }))
    }

    fn derived(
        instance_id: String,
        property_name: PropertyName,
        vars: Option<SharedVars>,
        parent: Option<Report>,
    ) -> Self {
        Self(Arc::new(ReportData {
            instance_id,
            property_name,
            props: None,
            vars,
            variants: None,
            parent,
        }))
    }

    /// The instance that produced this report.
    pub fn instance_id(&self) -> &str {
        &self.0.instance_id
    }

    /// The property this report describes.
    pub fn property_name(&self) -> &PropertyName {
        &self.0.property_name
    }

    /// The cleaned props of the instance, for own reports.
    pub fn props(&self) -> Option<&Props> {
        self.0.props.as_ref()
    }

    /// The variables visible when this report was built.
    pub fn vars(&self) -> Option<&SharedVars> {
        self.0.vars.as_ref()
    }

    /// The computed variant state, for own reports.
    pub fn variants(&self) -> Option<&Value> {
        self.0.variants.as_ref()
    }

    /// The report this one was derived from.
    pub fn parent(&self) -> Option<&Report> {
        self.0.parent.as_ref()
    }

    /// Iterates over the parent chain, nearest first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors::new(self)
    }

    /// Whether both handles point to the same record.
    pub fn ptr_eq(&self, other: &Report) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Serializes the record, including its parent chain, as a camelCase
    /// JSON object.
    pub fn to_json(&self) -> Value {
        let data = &*self.0;
        let mut object = Map::new();
        object.insert("instanceId".into(), Value::from(data.instance_id.as_str()));
        object.insert(
            "propertyName".into(),
            Value::from(data.property_name.as_str()),
        );
        if let Some(props) = &data.props {
            object.insert("props".into(), map_to_json(props));
        }
        if let Some(vars) = &data.vars {
            object.insert("vars".into(), map_to_json(vars));
        }
        if let Some(variants) = &data.variants {
            object.insert("variants".into(), variants.clone());
        }
        if let Some(parent) = &data.parent {
            object.insert("parentReport".into(), parent.to_json());
        }
        Value::Object(object)
    }
}

fn map_to_json(map: &IndexMap<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

/// Derives a sub-report from `parent`, merging newly supplied render-prop
/// arguments into the inherited variables.
///
/// With no new values the parent's variables are shared unchanged. Otherwise
/// the first value is stored under `namespace`, and when more than one value
/// was supplied the whole argument list is also stored under
/// `{namespace}Args`. A missing parent counts as having no variables.
///
/// Returns the new report together with the variables it carries.
///
/// ```
/// use clutch_report::report::{Report, merge_variables};
/// use serde_json::json;
///
/// let parent = Report::own("list", None, None, None);
/// let (item, vars) = merge_variables("list", "renderItem", Some(&parent), "item", vec![json!("x")]);
///
/// let vars = vars.unwrap();
/// assert_eq!(vars["item"], json!("x"));
/// assert!(!vars.contains_key("itemArgs"));
/// assert!(item.parent().unwrap().ptr_eq(&parent));
/// ```
pub fn merge_variables(
    instance_id: impl Into<String>,
    property_name: impl Into<PropertyName>,
    parent: Option<&Report>,
    namespace: &str,
    new_values: Vec<Value>,
) -> (Report, Option<SharedVars>) {
    let inherited = parent.and_then(Report::vars);

    let vars = match new_values.first() {
        None => inherited.cloned(),
        Some(first) => {
            let mut vars = inherited.map(|vars| Vars::clone(vars)).unwrap_or_default();
            vars.insert(namespace.to_owned(), first.clone());

            if new_values.len() > 1 {
                vars.insert(format!("{namespace}Args"), Value::Array(new_values));
            }

            Some(Arc::new(vars))
        }
    };

    let report = Report::derived(
        instance_id.into(),
        property_name.into(),
        vars.clone(),
        parent.cloned(),
    );

    (report, vars)
}
