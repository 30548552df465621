use chrono::FixedOffset;

use warden_core::DataType;

use super::AttributeValue;

/// An unordered multiset of values sharing one data type.
#[derive(Debug, Clone, PartialEq)]
pub struct Bag {
    data_type: DataType,
    values: Vec<AttributeValue>,
}

impl Bag {
    /// Callers guarantee every value already has `data_type`.
    pub fn new(data_type: DataType, values: Vec<AttributeValue>) -> Self {
        debug_assert!(values.iter().all(|v| v.data_type() == data_type));
        Self { data_type, values }
    }

    pub fn empty(data_type: DataType) -> Self {
        Self::new(data_type, Vec::new())
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<AttributeValue> {
        self.values
    }

    pub fn contains(&self, value: &AttributeValue, implicit: FixedOffset) -> bool {
        self.values.iter().any(|v| v.value_eq(value, implicit))
    }

    /// Number of members equal to `value`.
    pub fn count(&self, value: &AttributeValue, implicit: FixedOffset) -> usize {
        self.values
            .iter()
            .filter(|v| v.value_eq(value, implicit))
            .count()
    }

    /// Members with duplicates removed, first occurrence kept.
    pub fn distinct(&self, implicit: FixedOffset) -> Vec<AttributeValue> {
        let mut out: Vec<AttributeValue> = Vec::new();
        for v in &self.values {
            if !out.iter().any(|o| o.value_eq(v, implicit)) {
                out.push(v.clone());
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::temporal::utc;

    fn strings(items: &[&str]) -> Bag {
        Bag::new(
            DataType::String,
            items.iter().map(|s| AttributeValue::string(*s)).collect(),
        )
    }

    #[test]
    fn test_contains_and_count() {
        let bag = strings(&["a", "b", "a"]);
        assert_eq!(bag.len(), 3);
        assert!(bag.contains(&AttributeValue::string("a"), utc()));
        assert!(!bag.contains(&AttributeValue::string("c"), utc()));
        assert_eq!(bag.count(&AttributeValue::string("a"), utc()), 2);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let bag = strings(&["b", "a", "b", "c", "a"]);
        let distinct = bag.distinct(utc());
        assert_eq!(
            distinct,
            vec![
                AttributeValue::string("b"),
                AttributeValue::string("a"),
                AttributeValue::string("c"),
            ]
        );
    }

    #[test]
    fn test_empty_bag() {
        let bag = Bag::empty(DataType::Integer);
        assert!(bag.is_empty());
        assert_eq!(bag.data_type(), DataType::Integer);
    }
}
