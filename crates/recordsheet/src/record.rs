//! Record and field-metadata source contracts.

use std::collections::{BTreeMap, HashMap};

use crate::error::FieldAccessError;
use crate::spec::{EnumRawValue, SpecFieldDescriptor};

/// A record whose fields can be read by key.
///
/// `Sync` lets one sheet's rows be coerced on the rayon pool.
pub trait ExportRecord: Sync {
    /// Raw value of the field named `name`.
    fn field_value(&self, name: &str) -> Result<EnumRawValue, FieldAccessError>;
}

/// Static field metadata of a record type, in declaration order.
pub trait FieldSource {
    /// Fields declared by the type itself.
    fn field_descriptors() -> Vec<SpecFieldDescriptor>;

    /// Fields inherited from a parent record shape, placed first when requested.
    fn parent_field_descriptors() -> Vec<SpecFieldDescriptor> {
        Vec::new()
    }
}

impl ExportRecord for BTreeMap<String, EnumRawValue> {
    fn field_value(&self, name: &str) -> Result<EnumRawValue, FieldAccessError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| FieldAccessError::MissingField(name.to_string()))
    }
}

impl<S: std::hash::BuildHasher + Sync> ExportRecord for HashMap<String, EnumRawValue, S> {
    fn field_value(&self, name: &str) -> Result<EnumRawValue, FieldAccessError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| FieldAccessError::MissingField(name.to_string()))
    }
}

/// Combine parent and own fields, number them, then keep those visible in `view`.
///
/// `declaration_order` becomes the position in the combined list, so it stays
/// stable whatever the view.
pub fn select_fields(
    parent_fields: Vec<SpecFieldDescriptor>,
    fields: Vec<SpecFieldDescriptor>,
    view: Option<&str>,
) -> Vec<SpecFieldDescriptor> {
    parent_fields
        .into_iter()
        .chain(fields)
        .enumerate()
        .map(|(n_idx, field)| field.with_declaration_order(n_idx))
        .filter(|field| view.is_none_or(|tag| field.groups.contains(tag)))
        .collect()
}

/// One homogeneous list of records with its field metadata.
pub struct SpecRecordGroup<'a> {
    /// Fields inherited from a parent shape.
    pub parent_fields: Vec<SpecFieldDescriptor>,
    /// Fields of the record type.
    pub fields: Vec<SpecFieldDescriptor>,
    /// Records in output order.
    pub records: Vec<&'a dyn ExportRecord>,
}

impl<'a> SpecRecordGroup<'a> {
    pub fn new(fields: Vec<SpecFieldDescriptor>, records: Vec<&'a dyn ExportRecord>) -> Self {
        Self {
            parent_fields: Vec::new(),
            fields,
            records,
        }
    }

    /// Group typed records using the type's own metadata.
    pub fn from_records<T: ExportRecord + FieldSource>(records: &'a [T]) -> Self {
        Self {
            parent_fields: T::parent_field_descriptors(),
            fields: T::field_descriptors(),
            records: records.iter().map(|r| r as &dyn ExportRecord).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fields visible in `view`, parent fields first when `if_with_parent_fields`.
    pub fn select_fields(
        &self,
        view: Option<&str>,
        if_with_parent_fields: bool,
    ) -> Vec<SpecFieldDescriptor> {
        let parent_fields = if if_with_parent_fields {
            self.parent_fields.clone()
        } else {
            Vec::new()
        };
        select_fields(parent_fields, self.fields.clone(), view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        name: String,
        age: i64,
    }

    impl ExportRecord for Person {
        fn field_value(&self, name: &str) -> Result<EnumRawValue, FieldAccessError> {
            match name {
                "name" => Ok(self.name.clone().into()),
                "age" => Ok(self.age.into()),
                "id" => Ok(EnumRawValue::Integer(1)),
                _ => Err(FieldAccessError::MissingField(name.to_string())),
            }
        }
    }

    impl FieldSource for Person {
        fn field_descriptors() -> Vec<SpecFieldDescriptor> {
            vec![
                SpecFieldDescriptor::new("name", "Name").with_groups(["brief", "full"]),
                SpecFieldDescriptor::new("age", "Age").with_groups(["full"]),
            ]
        }

        fn parent_field_descriptors() -> Vec<SpecFieldDescriptor> {
            vec![SpecFieldDescriptor::new("id", "ID").with_groups(["full"])]
        }
    }

    fn derive_names(fields: &[SpecFieldDescriptor]) -> Vec<(&str, usize)> {
        fields
            .iter()
            .map(|f| (f.name.as_str(), f.declaration_order))
            .collect()
    }

    #[test]
    fn test_select_fields_by_view_keeps_declaration_order() {
        let people = vec![Person {
            name: "Ann".to_string(),
            age: 30,
        }];
        let group = SpecRecordGroup::from_records(&people);

        assert_eq!(
            derive_names(&group.select_fields(None, true)),
            vec![("id", 0), ("name", 1), ("age", 2)]
        );
        assert_eq!(
            derive_names(&group.select_fields(Some("brief"), true)),
            vec![("name", 1)]
        );
        assert_eq!(
            derive_names(&group.select_fields(Some("full"), false)),
            vec![("name", 0), ("age", 1)]
        );
        assert!(group.select_fields(Some("none"), true).is_empty());
    }

    #[test]
    fn test_map_records_report_missing_fields() {
        let mut record = BTreeMap::new();
        record.insert("a".to_string(), EnumRawValue::Integer(1));

        assert_eq!(record.field_value("a"), Ok(EnumRawValue::Integer(1)));
        assert_eq!(
            record.field_value("b"),
            Err(FieldAccessError::MissingField("b".to_string()))
        );
    }
}
