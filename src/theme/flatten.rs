use indexmap::IndexMap;
use serde_json::{Map, Value};
use triomphe::Arc;

use crate::{InstrumentError, Outcome};

/// Raw token table keyed by dotted path, as exposed under `__cssMap`.
pub type CssMap = IndexMap<String, Value>;

/// Field of a token entry holding the CSS variable reference.
pub const VAR_REF_FIELD: &str = "varRef";

const PATH_SEPARATOR: char = '.';

/// Nested token lookup tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenTree {
    /// A variable reference such as `var(--colors-red-500)`.
    Token(String),
    /// Named subtrees, in first-insertion order.
    Group(IndexMap<String, TokenTree>),
}

impl Default for TokenTree {
    fn default() -> Self {
        Self::Group(IndexMap::new())
    }
}

impl TokenTree {
    /// The variable reference, if this is a leaf.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(token) => Some(token),
            Self::Group(_) => None,
        }
    }

    /// The direct child named `segment`.
    pub fn get(&self, segment: &str) -> Option<&TokenTree> {
        match self {
            Self::Group(children) => children.get(segment),
            Self::Token(_) => None,
        }
    }

    /// The subtree at a dotted `path`.
    pub fn lookup(&self, path: &str) -> Option<&TokenTree> {
        path.split(PATH_SEPARATOR)
            .try_fold(self, |tree, segment| tree.get(segment))
    }

    /// Converts the tree into nested JSON objects with string leaves.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Token(token) => Value::from(token.as_str()),
            Self::Group(children) => Value::Object(
                children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

fn insert(root: &mut IndexMap<String, TokenTree>, path: &str, token: &str) {
    let mut segments = path.split(PATH_SEPARATOR);
    let last = segments.next_back().unwrap_or_default();

    let mut group = root;
    for segment in segments {
        let child = group
            .entry(segment.to_owned())
            .or_insert_with(TokenTree::default);
        if let TokenTree::Token(_) = child {
            *child = TokenTree::default();
        }
        group = match child {
            TokenTree::Group(children) => children,
            TokenTree::Token(_) => unreachable!("leaf replaced by a group above"),
        };
    }

    group.insert(last.to_owned(), TokenTree::Token(token.to_owned()));
}

fn var_ref<'a>(path: &str, entry: &'a Value) -> Outcome<&'a str> {
    entry
        .get(VAR_REF_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            rootcause::Report::new(InstrumentError::MissingVarRef).attach(format!("path: {path}"))
        })
}

/// Builds the nested lookup tree of a dotted-path token table.
///
/// Later paths win: a token replaces whatever an earlier path left at its
/// position, and a path running through an earlier token replaces that token
/// with a group. Entries without a string `varRef` are skipped and logged.
///
/// ```
/// use clutch_report::theme::{CssMap, flatten};
/// use serde_json::json;
///
/// let mut map = CssMap::new();
/// map.insert("a.b".into(), json!({ "varRef": "X" }));
/// map.insert("a.c".into(), json!({ "varRef": "Y" }));
///
/// let tree = flatten(&map);
/// assert_eq!(tree.to_json(), json!({ "a": { "b": "X", "c": "Y" } }));
/// assert_eq!(tree.lookup("a.c").and_then(|leaf| leaf.as_token()), Some("Y"));
/// ```
pub fn flatten(map: &CssMap) -> TokenTree {
    let mut root = IndexMap::new();
    for (path, entry) in map {
        match var_ref(path, entry) {
            Ok(token) => insert(&mut root, path, token),
            Err(report) => {
                tracing::warn!(target: "clutch_report::theme", "{report}; skipping token");
            }
        }
    }
    TokenTree::Group(root)
}

/// [`flatten`] with a single-entry memo keyed on the identity of the input.
///
/// A structurally equal but distinct table is flattened again.
#[derive(Debug, Default)]
pub struct TokenFlattener {
    last: spin::Mutex<Option<(Arc<CssMap>, Arc<TokenTree>)>>,
}

impl TokenFlattener {
    /// Creates a flattener with an empty memo.
    pub const fn new() -> Self {
        Self {
            last: spin::Mutex::new(None),
        }
    }

    /// Flattens `map`, or returns the previous tree if `map` is the table
    /// flattened last.
    pub fn flatten(&self, map: &Arc<CssMap>) -> Arc<TokenTree> {
        let mut last = self.last.lock();
        if let Some((input, output)) = &*last {
            if Arc::ptr_eq(input, map) {
                return output.clone();
            }
        }

        let output = Arc::new(flatten(map));
        *last = Some((map.clone(), output.clone()));
        output
    }

    /// Forgets the memoized pair.
    pub fn clear(&self) {
        *self.last.lock() = None;
    }
}
