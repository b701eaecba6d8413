//! Results schema
//!
//! Declares which run arguments become table columns and experiment
//! directory name components, and which runner outputs become columns. The
//! harness appends a `time` column itself.
//!
//! ```
//! use rankrun::schema::{ArgumentMapping, Schema};
//!
//! let schema = Schema::new(
//!     vec![
//!         ArgumentMapping::new("lr").column("learning_rate").in_name(),
//!         ArgumentMapping::new("seed").in_name(),
//!     ],
//!     vec![Some("accuracy".to_string()), None],
//! )
//! .unwrap();
//!
//! assert_eq!(schema.columns(), ["learning_rate", "accuracy", "time"]);
//! ```

use crate::error::{Error, Result};
use crate::value::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Column the harness fills with the shared elapsed time
pub const TIME_COLUMN: &str = "time";

/// Derives a directory name component from an argument value
pub type NamingFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// How an argument contributes to the experiment directory name
#[derive(Clone, Default)]
pub enum Naming {
    /// Not part of the name
    #[default]
    Exclude,
    /// The value's display form
    Verbatim,
    /// A caller-supplied rendering of the value
    Derived(NamingFn),
}

impl fmt::Debug for Naming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Naming::Exclude => write!(f, "Exclude"),
            Naming::Verbatim => write!(f, "Verbatim"),
            Naming::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// One run argument's role in the table and the directory name
#[derive(Debug, Clone)]
pub struct ArgumentMapping {
    /// Field name in the run arguments
    pub arg: String,
    /// Table column, `None` to leave it out of the table
    pub column: Option<String>,
    pub naming: Naming,
}

impl ArgumentMapping {
    /// Argument that is neither a column nor part of the name (yet)
    pub fn new(arg: impl Into<String>) -> Self {
        Self {
            arg: arg.into(),
            column: None,
            naming: Naming::Exclude,
        }
    }

    /// Record the argument under `column`
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Include the value verbatim in the directory name
    pub fn in_name(mut self) -> Self {
        self.naming = Naming::Verbatim;
        self
    }

    /// Include `derive(value)` in the directory name
    pub fn in_name_with<F>(mut self, derive: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.naming = Naming::Derived(Arc::new(derive));
        self
    }
}

/// Validated column layout of a results table
#[derive(Debug, Clone)]
pub struct Schema {
    arguments: Vec<ArgumentMapping>,
    returns: Vec<Option<String>>,
    columns: Vec<String>,
}

impl Schema {
    /// Validate the mappings and derive the column order
    ///
    /// Columns are argument columns, then return columns, then `time`.
    pub fn new(arguments: Vec<ArgumentMapping>, returns: Vec<Option<String>>) -> Result<Self> {
        let arg_cols: Vec<&String> = arguments.iter().filter_map(|m| m.column.as_ref()).collect();
        let ret_cols: Vec<&String> = returns.iter().flatten().collect();

        let arg_set = unique(&arg_cols)?;
        let ret_set = unique(&ret_cols)?;

        if let Some(shared) = arg_cols.iter().find(|c| ret_set.contains(c.as_str())) {
            return Err(Error::DuplicateColumn((*shared).clone()));
        }

        if arg_set.contains(TIME_COLUMN) || ret_set.contains(TIME_COLUMN) {
            return Err(Error::ReservedColumn(TIME_COLUMN.to_string()));
        }

        let columns = arg_cols
            .into_iter()
            .chain(ret_cols)
            .cloned()
            .chain(std::iter::once(TIME_COLUMN.to_string()))
            .collect();

        Ok(Self {
            arguments,
            returns,
            columns,
        })
    }

    /// Full column order, ending in `time`
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn arguments(&self) -> &[ArgumentMapping] {
        &self.arguments
    }

    pub fn returns(&self) -> &[Option<String>] {
        &self.returns
    }

    /// Directory name components and the argument names they came from
    pub fn naming_fields(&self, args: &RunArguments) -> Result<(Vec<String>, Vec<String>)> {
        let mut fields = Vec::new();
        let mut meanings = Vec::new();
        for mapping in &self.arguments {
            let rendered = match &mapping.naming {
                Naming::Exclude => continue,
                Naming::Verbatim => args.get(&mapping.arg)?.to_string(),
                Naming::Derived(derive) => (**derive)(args.get(&mapping.arg)?),
            };
            fields.push(rendered);
            meanings.push(mapping.arg.clone());
        }
        Ok((fields, meanings))
    }

    /// Cells for the argument columns, in column order
    pub fn input_values(&self, args: &RunArguments) -> Result<Vec<Value>> {
        self.arguments
            .iter()
            .filter(|m| m.column.is_some())
            .map(|m| args.get(&m.arg).cloned())
            .collect()
    }

    /// Runner outputs whose return mapping names a column
    pub fn select_outputs(&self, outputs: Vec<Value>) -> Result<Vec<Value>> {
        if outputs.len() != self.returns.len() {
            return Err(Error::OutputArity {
                expected: self.returns.len(),
                got: outputs.len(),
            });
        }
        Ok(outputs
            .into_iter()
            .zip(&self.returns)
            .filter_map(|(value, column)| column.as_ref().map(|_| value))
            .collect())
    }

    /// Complete table row: inputs, selected outputs, elapsed seconds
    pub fn row(&self, args: &RunArguments, outputs: Vec<Value>, elapsed_secs: f64) -> Result<Vec<Value>> {
        let mut row = self.input_values(args)?;
        row.extend(self.select_outputs(outputs)?);
        row.push(Value::Float(elapsed_secs));
        Ok(row)
    }
}

fn unique<'a>(columns: &[&'a String]) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for &column in columns {
        if !seen.insert(column.as_str()) {
            return Err(Error::DuplicateColumn(column.clone()));
        }
    }
    Ok(seen)
}

/// Run arguments captured by field name
///
/// Any `Serialize` struct works; a `clap` parser deriving `Serialize` is the
/// usual source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArguments {
    fields: BTreeMap<String, Value>,
}

impl RunArguments {
    /// Capture the top-level fields of `args`
    pub fn capture<A: Serialize>(args: &A) -> Result<Self> {
        let json = serde_json::to_value(args)
            .map_err(|e| Error::InvalidConfig(format!("run arguments are not serializable: {}", e)))?;
        match json {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            }),
            other => Err(Error::InvalidConfig(format!(
                "run arguments must serialize to a map of fields, got {}",
                other
            ))),
        }
    }

    /// Build from explicit name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownArgument(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_column_order() {
        let schema = Schema::new(
            vec![
                ArgumentMapping::new("lr").column("learning_rate").in_name(),
                ArgumentMapping::new("data").in_name(),
                ArgumentMapping::new("epochs").column("epochs"),
            ],
            vec![Some("accuracy".into()), None, Some("loss".into())],
        )
        .unwrap();
        assert_eq!(
            schema.columns(),
            cols(&["learning_rate", "epochs", "accuracy", "loss", "time"])
        );
    }

    #[test]
    fn test_no_columns_is_just_time() {
        let schema = Schema::new(vec![], vec![]).unwrap();
        assert_eq!(schema.columns(), cols(&["time"]));
    }

    #[test]
    fn test_time_is_reserved_in_inputs_and_outputs() {
        let err = Schema::new(vec![ArgumentMapping::new("t").column("time")], vec![]).unwrap_err();
        assert!(matches!(err, Error::ReservedColumn(ref c) if c == "time"));

        let err = Schema::new(vec![], vec![Some("time".into())]).unwrap_err();
        assert!(matches!(err, Error::ReservedColumn(_)));
    }

    #[test]
    fn test_duplicate_argument_columns() {
        let err = Schema::new(
            vec![
                ArgumentMapping::new("a").column("x"),
                ArgumentMapping::new("b").column("x"),
            ],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(ref c) if c == "x"));
    }

    #[test]
    fn test_duplicate_return_columns() {
        let err = Schema::new(vec![], vec![Some("y".into()), None, Some("y".into())]).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(_)));
    }

    #[test]
    fn test_input_output_overlap() {
        let err = Schema::new(
            vec![ArgumentMapping::new("acc").column("accuracy")],
            vec![Some("accuracy".into())],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(ref c) if c == "accuracy"));
    }

    #[derive(Serialize)]
    struct Args {
        lr: f64,
        seed: u64,
        data: String,
        verbose: bool,
    }

    fn args() -> RunArguments {
        RunArguments::capture(&Args {
            lr: 0.01,
            seed: 7,
            data: "/data/mnist.bin".to_string(),
            verbose: false,
        })
        .unwrap()
    }

    #[test]
    fn test_capture_reads_fields_by_name() {
        let args = args();
        assert_eq!(args.get("lr").unwrap(), &Value::Float(0.01));
        assert_eq!(args.get("seed").unwrap(), &Value::Int(7));
        assert!(matches!(args.get("nope"), Err(Error::UnknownArgument(_))));
    }

    #[test]
    fn test_capture_rejects_non_struct() {
        assert!(RunArguments::capture(&42u8).is_err());
    }

    #[test]
    fn test_naming_fields_verbatim_and_derived() {
        let schema = Schema::new(
            vec![
                ArgumentMapping::new("lr").column("learning_rate").in_name(),
                ArgumentMapping::new("verbose").column("verbose"),
                ArgumentMapping::new("data").in_name_with(|v| {
                    crate::harness::sanitize_filename(v.as_str()).unwrap_or_default()
                }),
                ArgumentMapping::new("seed").in_name(),
            ],
            vec![],
        )
        .unwrap();

        let (fields, meanings) = schema.naming_fields(&args()).unwrap();
        assert_eq!(fields, vec!["0.01", "mnist.bin", "7"]);
        assert_eq!(meanings, vec!["lr", "data", "seed"]);
    }

    #[test]
    fn test_naming_unknown_argument() {
        let schema = Schema::new(vec![ArgumentMapping::new("missing").in_name()], vec![]).unwrap();
        assert!(matches!(
            schema.naming_fields(&args()),
            Err(Error::UnknownArgument(ref a)) if a == "missing"
        ));
    }

    #[test]
    fn test_row_layout() {
        let schema = Schema::new(
            vec![
                ArgumentMapping::new("lr").column("learning_rate").in_name(),
                ArgumentMapping::new("data").in_name(),
            ],
            vec![Some("accuracy".into()), None],
        )
        .unwrap();

        let row = schema
            .row(&args(), vec![Value::Float(0.95), Value::Int(12)], 1.23)
            .unwrap();
        assert_eq!(row, vec![Value::Float(0.01), Value::Float(0.95), Value::Float(1.23)]);
        assert_eq!(row.len(), schema.columns().len());
    }

    #[test]
    fn test_output_arity_checked() {
        let schema = Schema::new(vec![], vec![Some("a".into()), None]).unwrap();
        let err = schema.select_outputs(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::OutputArity { expected: 2, got: 1 }));
    }
}
