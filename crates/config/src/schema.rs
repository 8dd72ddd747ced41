// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Useful JSON Schema definitions

use schemars::{
    JsonSchema,
    r#gen::SchemaGenerator,
    schema::{InstanceType, Metadata, Schema, SchemaObject},
};

/// A network hostname
pub struct Hostname;

impl JsonSchema for Hostname {
    fn schema_name() -> String {
        "Hostname".to_string()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        Schema::Object(SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("hostname".to_owned()),
            ..SchemaObject::default()
        })
    }
}

/// A JSON Web Key Set, as defined in RFC 7517
pub struct JsonWebKeySet;

impl JsonSchema for JsonWebKeySet {
    fn schema_name() -> String {
        "JsonWebKeySet".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let mut object = SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            metadata: Some(Box::new(Metadata {
                description: Some("A JSON Web Key Set, with a `keys` array".to_owned()),
                ..Metadata::default()
            })),
            ..SchemaObject::default()
        };

        let validation = object.object();
        validation
            .properties
            .insert("keys".to_owned(), generator.subschema_for::<Vec<serde_json::Value>>());
        validation.required.insert("keys".to_owned());

        Schema::Object(object)
    }
}
