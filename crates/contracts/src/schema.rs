//! Static description of the catalog record's fields.
//!
//! The table is declared once and never mutated; the filter compiler consults
//! it to validate parameter names and to decide between equality and
//! containment predicates.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One string value, filtered by equality.
    Scalar,
    /// A list of strings, filtered by containment.
    MultiValued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub filterable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub resource_name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

pub static RECORD_SCHEMA: RecordSchema = RecordSchema {
    resource_name: "Book",
    fields: &[
        FieldDescriptor {
            name: "id",
            kind: FieldKind::Scalar,
            filterable: false,
        },
        FieldDescriptor {
            name: "isbn",
            kind: FieldKind::Scalar,
            filterable: true,
        },
        FieldDescriptor {
            name: "title",
            kind: FieldKind::Scalar,
            filterable: true,
        },
        FieldDescriptor {
            name: "publisher",
            kind: FieldKind::Scalar,
            filterable: true,
        },
        FieldDescriptor {
            name: "authors",
            kind: FieldKind::MultiValued,
            filterable: true,
        },
        FieldDescriptor {
            name: "genres",
            kind: FieldKind::MultiValued,
            filterable: true,
        },
        FieldDescriptor {
            name: "imageKey",
            kind: FieldKind::Scalar,
            filterable: true,
        },
    ],
};

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|field| field.kind)
    }

    pub fn is_known_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Kind of `name` when it may appear as filter input.
    pub fn filter_kind(&self, name: &str) -> Option<FieldKind> {
        self.field(name)
            .filter(|field| field.filterable)
            .map(|field| field.kind)
    }
}
