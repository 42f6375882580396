//! ACM certificates
//!
//! Based on CloudFormation AWS::CertificateManager::Certificate. Imported
//! certificates carry their PEM material as write-only arguments; the
//! remote side never returns it.

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{ResourceDefinition, arn_attribute, string_set};

pub const VALIDATION_METHODS: &[&str] = &["DNS", "EMAIL"];

/// Returns the definition for aws_acm_certificate
pub fn aws_acm_certificate_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_acm_certificate")
        .with_description("Requests or imports an ACM certificate.")
        .attribute(
            AttributeSchema::new("domain_name", AttributeType::String)
                .optional_computed()
                .force_new()
                .conflicts_with(&["certificate_body"])
                .with_description("A domain name for which the certificate should be issued."),
        )
        .attribute(
            AttributeSchema::new("subject_alternative_names", string_set())
                .optional_computed()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "validation_method",
                AttributeType::enum_of(VALIDATION_METHODS),
            )
            .force_new()
            .conflicts_with(&["certificate_body"]),
        )
        .attribute(
            AttributeSchema::new("certificate_body", AttributeType::String)
                .force_new()
                .write_only()
                .with_description("The certificate's PEM-formatted public key."),
        )
        .attribute(
            AttributeSchema::new("private_key", AttributeType::String)
                .force_new()
                .sensitive()
                .write_only()
                .with_description("The certificate's PEM-formatted private key."),
        )
        .attribute(
            AttributeSchema::new("certificate_chain", AttributeType::String)
                .force_new()
                .write_only()
                .with_description("The certificate's PEM-formatted chain."),
        )
        .attribute(arn_attribute().with_provider_name("Arn"))
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_description("Status of the certificate."),
        );

    ResourceDefinition::new("AWS::CertificateManager::Certificate", schema)
        .with_tags()
        .identifier_attribute("arn")
}
