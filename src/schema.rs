use serde_derive::Deserialize;

use crate::error::{Error, Result};
use crate::sql::types::DataType;

/// A database schema: an ordered sequence of table descriptions, loaded
/// once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    pub tables: Vec<Table>,
}

/// A table schema. The first field is always the auto-assigned primary
/// key, synthesized from the table's key entry in the schema file.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    pub fields: Vec<Field>,
}

/// A single field of a table.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub datatype: DataType,
}

/// The schema file layout, before type checking.
#[derive(Debug, Deserialize)]
struct RawSchema {
    tables: Vec<RawTable>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    name: String,
    key: String,
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    datatype: String,
}

impl Schema {
    /// Loads and type-checks a schema from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()?;
        Self::from_raw(raw)
    }

    /// Loads and type-checks a schema from a YAML string.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Self::from_raw(raw)
    }

    /// Type-checks a raw schema, synthesizing each table's leading
    /// primary-key field.
    fn from_raw(raw: RawSchema) -> Result<Self> {
        let mut tables = Vec::with_capacity(raw.tables.len());
        for table in raw.tables {
            let mut fields =
                vec![Field { name: table.key.clone(), datatype: DataType::PrimaryKey }];
            for field in table.fields {
                let datatype = match field.datatype.as_str() {
                    "int" => DataType::Integer,
                    "string" => DataType::String,
                    datatype => {
                        return Err(Error::Config(format!(
                            "Unknown type {} for field {} in table {}",
                            datatype, field.name, table.name
                        )))
                    }
                };
                fields.push(Field { name: field.name, datatype });
            }
            for (i, field) in fields.iter().enumerate() {
                if fields[..i].iter().any(|other| other.name == field.name) {
                    return Err(Error::Config(format!(
                        "Duplicate field {} in table {}",
                        field.name, table.name
                    )));
                }
            }
            if tables.iter().any(|other: &Table| other.name == table.name) {
                return Err(Error::Config(format!("Duplicate table {}", table.name)));
            }
            tables.push(Table { name: table.name, fields });
        }
        Ok(Self { tables })
    }

    /// Fetches a table by name. Schemas are tiny, so a linear scan will do.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl Table {
    /// Fetches a field by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the name of the table's primary-key field.
    pub fn primary_key(&self) -> Result<&str> {
        self.fields
            .iter()
            .find(|field| field.datatype == DataType::PrimaryKey)
            .map(|field| field.name.as_str())
            .ok_or_else(|| Error::Value(format!("Primary key not found for table {}", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "\
tables:
  - name: user
    key: id
    fields:
      - { name: forename, type: string }
      - { name: surname,  type: string }
      - { name: address,  type: string }
  - name: order
    key: order_id
    fields:
      - { name: user_id, type: int }
      - { name: price,   type: int }
";

    #[test]
    fn loads_a_schema_and_synthesizes_primary_keys() {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        assert_eq!(schema.tables.len(), 2);

        let user = schema.get_table("user").unwrap();
        assert_eq!(
            user.fields,
            vec![
                Field { name: "id".into(), datatype: DataType::PrimaryKey },
                Field { name: "forename".into(), datatype: DataType::String },
                Field { name: "surname".into(), datatype: DataType::String },
                Field { name: "address".into(), datatype: DataType::String },
            ]
        );
        assert_eq!(user.primary_key(), Ok("id"));

        let order = schema.get_table("order").unwrap();
        assert_eq!(order.primary_key(), Ok("order_id"));
        assert_eq!(order.get_field("price").unwrap().datatype, DataType::Integer);
        assert!(order.get_field("missing").is_none());

        assert!(schema.get_table("missing").is_none());
    }

    #[test]
    fn unknown_field_types_are_rejected() {
        let result = Schema::from_yaml(
            "tables:\n  - name: t\n    key: id\n    fields:\n      - { name: f, type: float }\n",
        );
        assert_eq!(
            result,
            Err(Error::Config("Unknown type float for field f in table t".into()))
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Schema::from_yaml(
            "tables:\n  - name: t\n    key: id\n    fields:\n      - { name: id, type: int }\n",
        );
        assert_eq!(result, Err(Error::Config("Duplicate field id in table t".into())));

        let result = Schema::from_yaml(
            "tables:\n  - name: t\n    key: id\n    fields: []\n  - name: t\n    key: id\n    fields: []\n",
        );
        assert_eq!(result, Err(Error::Config("Duplicate table t".into())));
    }

    #[test]
    fn malformed_schema_files_are_config_errors() {
        assert!(matches!(Schema::from_yaml("tables: 42"), Err(Error::Config(_))));
    }
}
