//! Arrow schema definitions for equipment snapshots and reconciliation diffs.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::record::EquipmentRecord;

/// Column names shared by the equipment and diff schemas.
pub mod col {
    pub const NAME: &str = "name";
    pub const RARITY: &str = "rarity";
    pub const CATEGORY: &str = "category";
    pub const HP: &str = "hp";
    pub const ATTACK: &str = "attack";
    pub const DEFENSE: &str = "defense";
    pub const CRITICAL: &str = "critical";
    pub const EVASION: &str = "evasion";
    pub const ACCURACY: &str = "accuracy";
    pub const ABILITY: &str = "ability";
    pub const ABILITY_CATEGORY: &str = "ability_category";
    pub const SOURCE_SEQ: &str = "source_seq";
    pub const IMAGE_REF: &str = "image_ref";
    pub const IS_NEW: &str = "is_new";

    pub const MEMBERSHIP: &str = "membership";
    pub const SOURCE_TABLE: &str = "source_table";
}

fn record_fields() -> Vec<Field> {
    vec![
        Field::new(col::NAME, DataType::Utf8, true),
        Field::new(col::RARITY, DataType::Utf8, true),
        Field::new(col::CATEGORY, DataType::Utf8, true),
        Field::new(col::HP, DataType::Int64, true),
        Field::new(col::ATTACK, DataType::Int64, true),
        Field::new(col::DEFENSE, DataType::Int64, true),
        Field::new(col::CRITICAL, DataType::Float64, true),
        Field::new(col::EVASION, DataType::Float64, true),
        Field::new(col::ACCURACY, DataType::Float64, true),
        Field::new(col::ABILITY, DataType::Utf8, true),
        Field::new(col::ABILITY_CATEGORY, DataType::Utf8, true),
        Field::new(col::SOURCE_SEQ, DataType::Int64, false),
        Field::new(col::IMAGE_REF, DataType::Utf8, true),
        Field::new(col::IS_NEW, DataType::Boolean, true),
    ]
}

/// Schema for scraped, staged and canonical equipment snapshots.
pub fn equipment_schema() -> Schema {
    Schema::new(record_fields())
}

/// Schema for reconciliation diffs: a membership tag, the originating
/// canonical table (canonical-only rows), then the record columns.
pub fn diff_schema() -> Schema {
    let mut fields = vec![
        Field::new(col::MEMBERSHIP, DataType::Utf8, false),
        Field::new(col::SOURCE_TABLE, DataType::Utf8, true),
    ];
    fields.extend(record_fields());
    Schema::new(fields)
}

/// Record columns in [`equipment_schema`] order.
pub(crate) fn record_columns<'a>(
    records: impl Iterator<Item = &'a EquipmentRecord> + Clone,
) -> Vec<ArrayRef> {
    let strings = |f: fn(&EquipmentRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(records.clone().map(f).collect::<Vec<_>>()))
    };
    let ints = |f: fn(&EquipmentRecord) -> Option<i64>| -> ArrayRef {
        Arc::new(Int64Array::from(records.clone().map(f).collect::<Vec<_>>()))
    };
    let floats = |f: fn(&EquipmentRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(records.clone().map(f).collect::<Vec<_>>()))
    };

    vec![
        strings(|r| r.name.as_deref()),
        strings(|r| r.rarity.map(|x| x.as_str())),
        strings(|r| r.category.map(|x| x.as_str())),
        ints(|r| r.stats.hp),
        ints(|r| r.stats.attack),
        ints(|r| r.stats.defense),
        floats(|r| r.stats.critical),
        floats(|r| r.stats.evasion),
        floats(|r| r.stats.accuracy),
        strings(|r| r.ability.as_deref()),
        strings(|r| Some(r.ability_tag())),
        Arc::new(Int64Array::from(
            records.clone().map(|r| r.source_seq).collect::<Vec<_>>(),
        )),
        strings(|r| r.image_ref.as_deref()),
        Arc::new(BooleanArray::from(
            records.clone().map(|r| Some(r.is_new)).collect::<Vec<_>>(),
        )),
    ]
}

/// Build one [`equipment_schema`] batch from records.
pub fn records_to_batch(records: &[EquipmentRecord]) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        Arc::new(equipment_schema()),
        record_columns(records.iter()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Category, Rarity};
    use arrow::array::Array;

    #[test]
    fn equipment_schema_has_expected_fields() {
        let schema = equipment_schema();
        assert_eq!(schema.fields().len(), 14);
        assert!(schema.field_with_name(col::SOURCE_SEQ).is_ok());
        assert!(!schema.field_with_name(col::SOURCE_SEQ).unwrap().is_nullable());
        assert!(schema.field_with_name(col::NAME).unwrap().is_nullable());
    }

    #[test]
    fn diff_schema_prefixes_membership() {
        let schema = diff_schema();
        assert_eq!(schema.fields().len(), 16);
        assert_eq!(schema.field(0).name(), col::MEMBERSHIP);
        assert_eq!(schema.field(1).name(), col::SOURCE_TABLE);
        assert_eq!(schema.field(2).name(), col::NAME);
    }

    #[test]
    fn batch_preserves_nulls() {
        let mut sword = EquipmentRecord::named("Sword A", Rarity::Ur, 7);
        sword.category = Some(Category::Weapon);
        sword.stats.attack = Some(300);
        sword.stats.critical = Some(0.0);
        let frontier = EquipmentRecord::placeholder(9);

        let batch = records_to_batch(&[sword, frontier]).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let names = batch.column_by_name(col::NAME).unwrap();
        assert!(!names.is_null(0));
        assert!(names.is_null(1));

        let crit = batch
            .column_by_name(col::CRITICAL)
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(crit.value(0), 0.0);
        assert!(crit.is_null(1));

        let hp = batch.column_by_name(col::HP).unwrap();
        assert!(hp.is_null(0), "unlisted stat stays null, not zero");
    }

    #[test]
    fn empty_record_set_builds_empty_batch() {
        let batch = records_to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 14);
    }
}
