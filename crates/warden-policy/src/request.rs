//! The decision request: attributes grouped by category.
//!
//! Values stay in their raw `{data_type, value}` form until a designator asks
//! for them, so a malformed value only matters to the policies that read it.

use serde::{Deserialize, Serialize};

use warden_core::{AttributeId, Category, DataType};

use crate::value::RawValue;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub attributes: Vec<RequestAttributes>,
    #[serde(default)]
    pub return_policy_id_list: bool,
}

/// All attributes of one category, plus optional structured content that
/// attribute selectors navigate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAttributes {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default)]
    pub values: Vec<RawValue>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value of an attribute, creating the category and attribute
    /// entries as needed.
    pub fn with_value(
        mut self,
        category: impl Into<Category>,
        attribute_id: impl Into<AttributeId>,
        data_type: DataType,
        value: impl Into<String>,
    ) -> Self {
        self.add_value(category.into(), attribute_id.into(), None, RawValue::new(data_type, value));
        self
    }

    pub fn with_issued_value(
        mut self,
        category: impl Into<Category>,
        attribute_id: impl Into<AttributeId>,
        issuer: impl Into<String>,
        data_type: DataType,
        value: impl Into<String>,
    ) -> Self {
        self.add_value(
            category.into(),
            attribute_id.into(),
            Some(issuer.into()),
            RawValue::new(data_type, value),
        );
        self
    }

    pub fn with_content(mut self, category: impl Into<Category>, content: serde_json::Value) -> Self {
        let category = category.into();
        self.category_mut(&category).content = Some(content);
        self
    }

    pub fn with_policy_id_list(mut self) -> Self {
        self.return_policy_id_list = true;
        self
    }

    pub fn add_value(&mut self, category: Category, attribute_id: AttributeId, issuer: Option<String>, value: RawValue) {
        let group = self.category_mut(&category);
        match group
            .attributes
            .iter_mut()
            .find(|a| a.attribute_id == attribute_id && a.issuer == issuer)
        {
            Some(attr) => attr.values.push(value),
            None => group.attributes.push(Attribute {
                attribute_id,
                issuer,
                values: vec![value],
            }),
        }
    }

    fn category_mut(&mut self, category: &Category) -> &mut RequestAttributes {
        let position = match self.attributes.iter().position(|g| &g.category == category) {
            Some(p) => p,
            None => {
                self.attributes.push(RequestAttributes {
                    category: category.clone(),
                    content: None,
                    attributes: Vec::new(),
                });
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[position]
    }

    /// Every category group with the given category. Requests may repeat a
    /// category; all groups are searched.
    pub fn categories<'a>(&'a self, category: &Category) -> impl Iterator<Item = &'a RequestAttributes> + 'a {
        let category = category.clone();
        self.attributes.iter().filter(move |g| g.category == category)
    }

    /// Raw values of `attribute_id` with `data_type` in `category`. When
    /// `issuer` is given only attributes with that issuer qualify.
    pub fn raw_values(
        &self,
        category: &Category,
        attribute_id: &AttributeId,
        data_type: DataType,
        issuer: Option<&str>,
    ) -> Vec<&RawValue> {
        self.categories(category)
            .flat_map(|g| g.attributes.iter())
            .filter(|a| &a.attribute_id == attribute_id)
            .filter(|a| match issuer {
                Some(wanted) => a.issuer.as_deref() == Some(wanted),
                None => true,
            })
            .flat_map(|a| a.values.iter())
            .filter(|v| v.data_type == data_type)
            .collect()
    }

    /// Structured content of the first group of `category` that has any.
    pub fn content(&self, category: &Category) -> Option<&serde_json::Value> {
        self.categories(category).find_map(|g| g.content.as_ref())
    }
}
