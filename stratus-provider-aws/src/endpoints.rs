//! Endpoint overrides - service names accepted in the `endpoints` block

use std::sync::LazyLock;

use stratus_core::registry::Registry;
use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema};
use stratus_core::resource::Value;

/// Service names that accept a custom endpoint URL
pub const ENDPOINT_SERVICE_NAMES: &[&str] = &[
    "accessanalyzer",
    "acm",
    "acmpca",
    "amplify",
    "apigateway",
    "appconfig",
    "applicationautoscaling",
    "applicationinsights",
    "appmesh",
    "apprunner",
    "appstream",
    "appsync",
    "athena",
    "auditmanager",
    "autoscaling",
    "autoscalingplans",
    "backup",
    "batch",
    "budgets",
    "chime",
    "cloud9",
    "cloudcontrolapi",
    "cloudformation",
    "cloudfront",
    "cloudhsm",
    "cloudsearch",
    "cloudtrail",
    "cloudwatch",
    "cloudwatchevents",
    "cloudwatchlogs",
    "codeartifact",
    "codebuild",
    "codecommit",
    "codedeploy",
    "codepipeline",
    "codestarconnections",
    "cognitoidentity",
    "cognitoidp",
    "configservice",
    "connect",
    "cur",
    "dataexchange",
    "datapipeline",
    "datasync",
    "dax",
    "detective",
    "devicefarm",
    "directconnect",
    "dlm",
    "dms",
    "docdb",
    "ds",
    "dynamodb",
    "ec2",
    "ecr",
    "ecrpublic",
    "ecs",
    "efs",
    "eks",
    "elasticache",
    "elasticbeanstalk",
    "elastictranscoder",
    "elb",
    "emr",
    "emrcontainers",
    "es",
    "firehose",
    "fms",
    "forecast",
    "fsx",
    "gamelift",
    "glacier",
    "globalaccelerator",
    "glue",
    "greengrass",
    "guardduty",
    "iam",
    "identitystore",
    "imagebuilder",
    "inspector",
    "iot",
    "iotanalytics",
    "iotevents",
    "kafka",
    "kinesis",
    "kinesisanalytics",
    "kinesisanalyticsv2",
    "kinesisvideo",
    "kms",
    "lakeformation",
    "lambda",
    "lexmodels",
    "licensemanager",
    "lightsail",
    "location",
    "macie",
    "macie2",
    "managedblockchain",
    "marketplacecatalog",
    "mediaconnect",
    "mediaconvert",
    "medialive",
    "mediapackage",
    "mediastore",
    "mediastoredata",
    "mq",
    "mwaa",
    "neptune",
    "networkfirewall",
    "networkmanager",
    "opsworks",
    "organizations",
    "outposts",
    "personalize",
    "pinpoint",
    "pricing",
    "qldb",
    "quicksight",
    "ram",
    "rds",
    "redshift",
    "resourcegroups",
    "resourcegroupstaggingapi",
    "route53",
    "route53domains",
    "route53resolver",
    "s3",
    "s3control",
    "s3outposts",
    "sagemaker",
    "schemas",
    "sdb",
    "secretsmanager",
    "securityhub",
    "serverlessrepo",
    "servicecatalog",
    "servicediscovery",
    "servicequotas",
    "ses",
    "shield",
    "signer",
    "sns",
    "sqs",
    "ssm",
    "ssoadmin",
    "stepfunctions",
    "storagegateway",
    "sts",
    "swf",
    "synthetics",
    "timestreamwrite",
    "transfer",
    "waf",
    "wafregional",
    "wafv2",
    "worklink",
    "workmail",
    "workspaces",
    "xray",
];

/// Endpoint services indexed by name. Forcing this table aborts on a
/// duplicate service name.
pub static ENDPOINT_SERVICES: LazyLock<Registry<()>> = LazyLock::new(|| {
    Registry::from_entries(
        "endpoint service",
        ENDPOINT_SERVICE_NAMES.iter().map(|name| (*name, ())),
    )
});

/// One optional string attribute per endpoint service, defaulting to ""
pub fn endpoints_schema() -> BlockSchema {
    ENDPOINT_SERVICES
        .names()
        .fold(BlockSchema::new(), |block, name| {
            block.attribute(
                AttributeSchema::new(name, AttributeType::String)
                    .with_default(Value::String(String::new()))
                    .with_description("Use this to override the default service endpoint URL"),
            )
        })
}
