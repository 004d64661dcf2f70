//! CSV source and sink for bulk loads and Kardex exports.
//!
//! Bulk files use the plant's column names: `productoid`, `nombre`, `costo`,
//! `cantidad_consolidada`, `nuevo_valor_absoluto` and `nuevo_costo`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::models::{BulkRow, BulkTemplateRow, KardexExport};

#[derive(Debug, Deserialize, Serialize)]
struct BulkRecord {
    productoid: String,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    costo: Option<String>,
    #[serde(default)]
    cantidad_consolidada: Option<String>,
    #[serde(default)]
    nuevo_valor_absoluto: Option<String>,
    #[serde(default)]
    nuevo_costo: Option<String>,
}

#[derive(Debug, Serialize)]
struct KardexRecord<'a> {
    fecha: String,
    movimiento_id: i32,
    transaccion_id: i32,
    tipo: &'a str,
    almacen: &'a str,
    lote: &'a str,
    fecha_produccion: String,
    fecha_vencimiento: String,
    entrada: Decimal,
    salida: Decimal,
    saldo: Decimal,
}

/// Reads bulk rows. Row numbers count the header as row 1, like a spreadsheet.
pub fn read_bulk_rows<R: Read>(reader: R) -> Result<Vec<BulkRow>, ServiceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<BulkRecord>().enumerate() {
        let row_number = index + 2;
        let record = record.map_err(|e| {
            ServiceError::ValidationError(format!("row {}: unreadable record: {}", row_number, e))
        })?;
        if record.productoid.is_empty() {
            continue;
        }
        rows.push(BulkRow {
            row_number,
            declared_quantity: parse_cell(row_number, "nuevo_valor_absoluto", &record.nuevo_valor_absoluto)?,
            declared_new_cost: parse_cell(row_number, "nuevo_costo", &record.nuevo_costo)?,
            product_id: record.productoid,
        });
    }
    Ok(rows)
}

fn parse_cell(
    row_number: usize,
    column: &str,
    cell: &Option<String>,
) -> Result<Option<Decimal>, ServiceError> {
    match cell.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Decimal::from_str(raw).map(Some).map_err(|_| {
            ServiceError::ValidationError(format!(
                "row {}: {} is not a number: {}",
                row_number, column, raw
            ))
        }),
    }
}

/// Template with the current state filled in and the declared columns left blank.
pub fn write_bulk_template<W: Write>(
    writer: W,
    rows: &[BulkTemplateRow],
) -> Result<(), ServiceError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(BulkRecord {
                productoid: row.product_id.clone(),
                nombre: Some(row.name.clone()),
                costo: Some(row.cost.to_string()),
                cantidad_consolidada: Some(row.consolidated_quantity.to_string()),
                nuevo_valor_absoluto: None,
                nuevo_costo: None,
            })
            .map_err(csv_error)?;
    }
    csv_writer.flush().map_err(|e| ServiceError::InternalError(e.to_string()))
}

pub fn write_kardex<W: Write>(writer: W, export: &KardexExport) -> Result<(), ServiceError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &export.rows {
        csv_writer
            .serialize(KardexRecord {
                fecha: row.occurred_at.to_rfc3339(),
                movimiento_id: row.movement_id,
                transaccion_id: row.transaction_id,
                tipo: &row.movement_type,
                almacen: &row.warehouse,
                lote: row.batch_number.as_deref().unwrap_or(""),
                fecha_produccion: row.production_date.map(|d| d.to_string()).unwrap_or_default(),
                fecha_vencimiento: row.expiration_date.map(|d| d.to_string()).unwrap_or_default(),
                entrada: row.entrada,
                salida: row.salida,
                saldo: row.balance,
            })
            .map_err(csv_error)?;
    }
    csv_writer.flush().map_err(|e| ServiceError::InternalError(e.to_string()))
}

fn csv_error(e: csv::Error) -> ServiceError {
    ServiceError::InternalError(format!("csv: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blank_cells_stay_blank() {
        let data = "productoid,nombre,costo,cantidad_consolidada,nuevo_valor_absoluto,nuevo_costo\n\
                    MP-1,Harina,10,100,120,\n\
                    MP-2,Azucar,5,40,,7.5\n\
                    ,,,,,\n";
        let rows = read_bulk_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].declared_quantity, Some(dec!(120)));
        assert_eq!(rows[0].declared_new_cost, None);
        assert_eq!(rows[1].declared_quantity, None);
        assert_eq!(rows[1].declared_new_cost, Some(dec!(7.5)));
    }

    #[test]
    fn non_numeric_cells_are_reported_with_their_row() {
        let data = "productoid,nuevo_valor_absoluto\nMP-1,doce\n";
        let err = read_bulk_rows(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn template_leaves_declared_columns_empty() {
        let mut out = Vec::new();
        write_bulk_template(
            &mut out,
            &[BulkTemplateRow {
                product_id: "MP-1".into(),
                name: "Harina".into(),
                cost: dec!(10),
                consolidated_quantity: dec!(100),
            }],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "productoid,nombre,costo,cantidad_consolidada,nuevo_valor_absoluto,nuevo_costo\n\
             MP-1,Harina,10,100,,\n"
        );
    }
}
