//! CloudWatch Logs log groups and streams

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{ResourceDefinition, arn_attribute};

/// Retention periods accepted by CloudWatch Logs
pub const RETENTION_DAYS: &[i64] = &[
    0, 1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
    2922, 3288, 3653,
];

fn retention_in_days() -> AttributeType {
    AttributeType::Custom {
        name: "RetentionInDays".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value.as_int() {
            Some(days) if RETENTION_DAYS.contains(&days) => Ok(()),
            Some(days) => Err(format!("{days} is not a valid retention period")),
            None => Err("Expected integer".to_string()),
        },
    }
}

/// Returns the definition for aws_cloudwatch_log_group
pub fn aws_cloudwatch_log_group_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_cloudwatch_log_group")
        .with_description("Provides a CloudWatch Log Group resource.")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_provider_name("LogGroupName")
                .with_description("The name of the log group."),
        )
        .attribute(
            AttributeSchema::new("retention_in_days", retention_in_days())
                .with_description("Specifies the number of days you want to retain log events."),
        )
        .attribute(
            AttributeSchema::new("kms_key_id", types::arn())
                .with_description("The ARN of the KMS Key to use when encrypting log data."),
        )
        .attribute(arn_attribute().with_provider_name("Arn"));

    ResourceDefinition::new("AWS::Logs::LogGroup", schema)
        .with_tags()
        .identifier_attribute("name")
}

/// Returns the definition for aws_cloudwatch_log_stream
pub fn aws_cloudwatch_log_stream_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_cloudwatch_log_stream")
        .with_description("Provides a CloudWatch Log Stream resource.")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("LogStreamName"),
        )
        .attribute(
            AttributeSchema::new("log_group_name", AttributeType::String)
                .required()
                .force_new(),
        );

    ResourceDefinition::new("AWS::Logs::LogStream", schema)
}
