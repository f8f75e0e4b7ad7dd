//! BigQuery wire conversions
//!
//! REST のワイヤ形式（値は全て文字列）をスキーマに従って JSON 値に変換する

use anyhow::{Context, Result};
use google_cloud_bigquery::http::job::{JobConfigurationExtract, JobConfigurationExtractSource};
use google_cloud_bigquery::http::table::{
    DestinationFormat, TableFieldMode, TableFieldSchema, TableFieldType, TableReference,
    TableSchema,
};
use google_cloud_bigquery::http::tabledata::list::{Tuple, Value};
use serde::Deserialize;
use serde_json::{json, Number};

use crate::domain::entities::column::{FieldMode, FieldSchema};
use crate::domain::entities::table_ref::{ExtractFormat, ExtractRequest, QueryRow};

/// Builds the extract job configuration
///
/// Delimiter and header are only sent for CSV.
pub fn extract_configuration(request: &ExtractRequest) -> JobConfigurationExtract {
    let csv = request.format == ExtractFormat::Csv;
    JobConfigurationExtract {
        destination_uris: vec![request.destination_uri.clone()],
        print_header: csv.then_some(request.print_header),
        field_delimiter: csv.then(|| request.field_delimiter.clone()),
        destination_format: Some(match request.format {
            ExtractFormat::Csv => DestinationFormat::Csv,
            ExtractFormat::Json => DestinationFormat::NewlineDelimitedJson,
        }),
        compression: Some(if request.gzip { "GZIP" } else { "NONE" }.to_string()),
        source: JobConfigurationExtractSource::SourceTable(TableReference {
            project_id: request.source.project_id.clone(),
            dataset_id: request.source.dataset_id.clone(),
            table_id: request.source.table_id.clone(),
        }),
        ..Default::default()
    }
}

/// Converts one result row using the query schema
pub fn convert_row(fields: &[TableFieldSchema], row: &Tuple) -> QueryRow {
    fields
        .iter()
        .zip(row.f.iter())
        .map(|(field, cell)| (field.name.clone(), convert_value(field, &cell.v)))
        .collect()
}

/// Converts all rows of a page, tolerating a missing schema
pub fn convert_rows(schema: Option<&TableSchema>, rows: &[Tuple]) -> Vec<QueryRow> {
    let fields = schema.map(|s| s.fields.as_slice()).unwrap_or(&[]);
    rows.iter().map(|row| convert_row(fields, row)).collect()
}

fn convert_value(field: &TableFieldSchema, value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Array(cells) => serde_json::Value::Array(
            cells
                .iter()
                .map(|cell| convert_value(field, &cell.v))
                .collect(),
        ),
        Value::Struct(tuple) => {
            let nested = field.fields.as_deref().unwrap_or(&[]);
            serde_json::Value::Object(convert_row(nested, tuple))
        }
        Value::String(raw) => convert_scalar(&field.data_type, raw),
    }
}

fn convert_scalar(data_type: &TableFieldType, raw: &str) -> serde_json::Value {
    match data_type {
        TableFieldType::Integer | TableFieldType::Int64 => raw
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string())),
        TableFieldType::Float | TableFieldType::Float64 => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(raw.to_string())),
        TableFieldType::Boolean | TableFieldType::Bool => match raw {
            "true" => serde_json::Value::Bool(true),
            "false" => serde_json::Value::Bool(false),
            _ => serde_json::Value::String(raw.to_string()),
        },
        _ => serde_json::Value::String(raw.to_string()),
    }
}

/// Builds the SDK field definition for table creation
pub fn to_table_field(field: &FieldSchema) -> Result<TableFieldSchema> {
    serde_json::from_value(json!({
        "name": field.name,
        "type": field.data_type.to_uppercase(),
        "mode": field.mode,
    }))
    .with_context(|| format!("Unsupported field type {} for {}", field.data_type, field.name))
}

/// Reads the SDK field definition back into the domain form
pub fn from_table_field(field: &TableFieldSchema) -> FieldSchema {
    let data_type = serde_json::to_value(&field.data_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let mode = match field.mode {
        Some(TableFieldMode::Required) => FieldMode::Required,
        Some(TableFieldMode::Repeated) => FieldMode::Repeated,
        _ => FieldMode::Nullable,
    };

    FieldSchema {
        name: field.name.clone(),
        data_type,
        mode,
    }
}

/// `projects.list` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectList {
    pub projects: Vec<ProjectItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectItem {
    pub id: String,
}

/// `datasets.list` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetList {
    pub datasets: Vec<DatasetItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetItem {
    pub dataset_reference: DatasetReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub dataset_id: String,
}

/// `tables.list` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableList {
    pub tables: Vec<TableItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableItem {
    pub table_reference: TableItemReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableItemReference {
    pub table_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::table_ref::TableRef;

    fn field(value: serde_json::Value) -> TableFieldSchema {
        serde_json::from_value(value).unwrap()
    }

    fn tuple(value: serde_json::Value) -> Tuple {
        serde_json::from_value(value).unwrap()
    }

    fn extract_request(format: ExtractFormat) -> ExtractRequest {
        ExtractRequest {
            source: TableRef::new("p", "_tmp", "anon"),
            destination_uri: "gs://bucket/out-*".to_string(),
            format,
            field_delimiter: "\t".to_string(),
            print_header: false,
            gzip: true,
            labels: Default::default(),
        }
    }

    #[test]
    fn test_extract_configuration_csv() {
        let config = extract_configuration(&extract_request(ExtractFormat::Csv));

        assert_eq!(config.destination_uris, vec!["gs://bucket/out-*"]);
        assert_eq!(config.destination_format, Some(DestinationFormat::Csv));
        assert_eq!(config.field_delimiter.as_deref(), Some("\t"));
        assert_eq!(config.print_header, Some(false));
        assert_eq!(config.compression.as_deref(), Some("GZIP"));
        match config.source {
            JobConfigurationExtractSource::SourceTable(table) => {
                assert_eq!(table.project_id, "p");
                assert_eq!(table.dataset_id, "_tmp");
                assert_eq!(table.table_id, "anon");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_extract_configuration_json_skips_csv_options() {
        let mut request = extract_request(ExtractFormat::Json);
        request.gzip = false;
        let config = extract_configuration(&request);

        assert_eq!(
            config.destination_format,
            Some(DestinationFormat::NewlineDelimitedJson)
        );
        assert!(config.field_delimiter.is_none());
        assert!(config.print_header.is_none());
        assert_eq!(config.compression.as_deref(), Some("NONE"));
    }

    #[test]
    fn test_convert_row_scalars() {
        let fields = vec![
            field(json!({"name": "id", "type": "INTEGER"})),
            field(json!({"name": "score", "type": "FLOAT"})),
            field(json!({"name": "active", "type": "BOOLEAN"})),
            field(json!({"name": "name", "type": "STRING"})),
            field(json!({"name": "created", "type": "TIMESTAMP"})),
        ];
        let row = tuple(json!({"f": [
            {"v": "42"},
            {"v": "1.5"},
            {"v": "true"},
            {"v": "alice"},
            {"v": "1.7e9"}
        ]}));

        let converted = convert_row(&fields, &row);

        assert_eq!(converted["id"], json!(42));
        assert_eq!(converted["score"], json!(1.5));
        assert_eq!(converted["active"], json!(true));
        assert_eq!(converted["name"], json!("alice"));
        assert_eq!(converted["created"], json!("1.7e9"));
    }

    #[test]
    fn test_convert_row_null() {
        let fields = vec![field(json!({"name": "id", "type": "INTEGER"}))];
        let row = tuple(json!({"f": [{"v": null}]}));

        let converted = convert_row(&fields, &row);
        assert_eq!(converted["id"], serde_json::Value::Null);
    }

    #[test]
    fn test_convert_row_repeated_and_record() {
        let fields = vec![
            field(json!({"name": "tags", "type": "STRING", "mode": "REPEATED"})),
            field(json!({
                "name": "address",
                "type": "RECORD",
                "fields": [
                    {"name": "city", "type": "STRING"},
                    {"name": "zip", "type": "INTEGER"}
                ]
            })),
        ];
        let row = tuple(json!({"f": [
            {"v": [{"v": "a"}, {"v": "b"}]},
            {"v": {"f": [{"v": "Tokyo"}, {"v": "100"}]}}
        ]}));

        let converted = convert_row(&fields, &row);

        assert_eq!(converted["tags"], json!(["a", "b"]));
        assert_eq!(converted["address"], json!({"city": "Tokyo", "zip": 100}));
    }

    #[test]
    fn test_unparsable_number_kept_as_string() {
        let fields = vec![field(json!({"name": "id", "type": "INT64"}))];
        let row = tuple(json!({"f": [{"v": "NaN"}]}));

        assert_eq!(convert_row(&fields, &row)["id"], json!("NaN"));
    }

    #[test]
    fn test_convert_rows_without_schema() {
        let rows = vec![tuple(json!({"f": [{"v": "1"}]}))];
        let converted = convert_rows(None, &rows);

        assert_eq!(converted.len(), 1);
        assert!(converted[0].is_empty());
    }

    #[test]
    fn test_table_field_conversion() {
        let schema = FieldSchema::new("id", "integer").with_mode(FieldMode::Required);

        let table_field = to_table_field(&schema).unwrap();
        assert_eq!(table_field.name, "id");
        assert_eq!(table_field.mode, Some(TableFieldMode::Required));

        let back = from_table_field(&table_field);
        assert_eq!(back, FieldSchema::new("id", "INTEGER").with_mode(FieldMode::Required));
    }

    #[test]
    fn test_to_table_field_rejects_unknown_type() {
        let schema = FieldSchema::new("id", "NOT_A_TYPE");
        assert!(to_table_field(&schema).is_err());
    }

    #[test]
    fn test_list_responses_deserialize() {
        let projects: ProjectList = serde_json::from_value(json!({
            "kind": "bigquery#projectList",
            "projects": [{"id": "p1", "numericId": "1"}, {"id": "p2"}],
            "nextPageToken": "tok"
        }))
        .unwrap();
        assert_eq!(projects.projects.len(), 2);
        assert_eq!(projects.projects[1].id, "p2");
        assert_eq!(projects.next_page_token.as_deref(), Some("tok"));

        let datasets: DatasetList = serde_json::from_value(json!({
            "datasets": [{"datasetReference": {"projectId": "p", "datasetId": "d1"}}]
        }))
        .unwrap();
        assert_eq!(datasets.datasets[0].dataset_reference.dataset_id, "d1");
        assert!(datasets.next_page_token.is_none());

        let tables: TableList = serde_json::from_value(json!({
            "tables": [{"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "t1"}}]
        }))
        .unwrap();
        assert_eq!(tables.tables[0].table_reference.table_id, "t1");
    }

    #[test]
    fn test_empty_list_response() {
        let tables: TableList = serde_json::from_value(json!({"totalItems": 0})).unwrap();
        assert!(tables.tables.is_empty());
    }
}
