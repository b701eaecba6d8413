//! Runner return values
//!
//! A runner returns any `RunOutputs` type; its values line up one-to-one with
//! the schema's return mappings.

use crate::stats::Stats;
use crate::value::Value;

/// Values a runner produces, in return-mapping order
pub trait RunOutputs {
    fn output_values(&self) -> Vec<Value>;
}

impl RunOutputs for () {
    fn output_values(&self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! tuple_outputs {
    ($($idx:tt $name:ident),+) => {
        impl<$($name),+> RunOutputs for ($($name,)+)
        where
            $($name: Clone + Into<Value>),+
        {
            fn output_values(&self) -> Vec<Value> {
                vec![$(self.$idx.clone().into()),+]
            }
        }
    };
}

tuple_outputs!(0 A);
tuple_outputs!(0 A, 1 B);
tuple_outputs!(0 A, 1 B, 2 C);
tuple_outputs!(0 A, 1 B, 2 C, 3 D);
tuple_outputs!(0 A, 1 B, 2 C, 3 D, 4 E);
tuple_outputs!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);

impl<T: Clone + Into<Value>> RunOutputs for Vec<T> {
    fn output_values(&self) -> Vec<Value> {
        self.iter().cloned().map(Into::into).collect()
    }
}

impl<T: Clone + Into<Value>, const N: usize> RunOutputs for [T; N] {
    fn output_values(&self) -> Vec<Value> {
        self.iter().cloned().map(Into::into).collect()
    }
}

/// `min, max, mean, var, count`
impl RunOutputs for Stats {
    fn output_values(&self) -> Vec<Value> {
        vec![
            Value::Float(self.min),
            Value::Float(self.max),
            Value::Float(self.mean),
            Value::Float(self.var),
            Value::from(self.count),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuples() {
        assert!(().output_values().is_empty());
        assert_eq!((0.95,).output_values(), vec![Value::Float(0.95)]);
        assert_eq!(
            (1u32, "adam", Some(2.5), None::<i64>).output_values(),
            vec![Value::Int(1), Value::from("adam"), Value::Float(2.5), Value::Null]
        );
    }

    #[test]
    fn test_sequences() {
        assert_eq!(vec![1i64, 2].output_values(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!([true; 3].output_values().len(), 3);
    }

    #[test]
    fn test_stats_order() {
        let stats = Stats::from_samples(&[1.0, 3.0]).unwrap();
        assert_eq!(
            stats.output_values(),
            vec![
                Value::Float(1.0),
                Value::Float(3.0),
                Value::Float(2.0),
                Value::Float(1.0),
                Value::Int(2),
            ]
        );
    }
}
