use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The closed set of catalog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    // Channels
    EmailCommunication,
    ChatMessaging,
    SocialMedia,
    VideoMedia,
    VoiceTelephony,
    WebhooksHttp,
    FormsSurveys,
    // Business functions
    CrmSales,
    SalesOutreach,
    MarketingCampaigns,
    SupportHelpdesk,
    EcommercePayments,
    HrRecruiting,
    AnalyticsReporting,
    ProjectTaskManagement,
    FinanceInvoicing,
    DocumentationKnowledge,
    // Data / AI
    AiLlms,
    RagVectorSearch,
    SummarizationQa,
    ClassificationRouting,
    SeoContent,
    DataExtractionScraping,
    EtlDataPipelines,
    // Tools
    GoogleWorkspace,
    Spreadsheets,
    DatabasesStorage,
    DeveloperTools,
    CloudDevops,
    NotionKnowledgeTools,
    // Cross-cutting
    AutomationOrchestration,
    MonitoringAlerts,
    Notifications,
    SchedulingCalendar,
    BackupSync,
    UtilitiesHelpers,
    Other,
}

impl Category {
    /// Every category, in the order offered to the language model.
    pub const ALL: [Category; 37] = [
        Category::EmailCommunication,
        Category::ChatMessaging,
        Category::SocialMedia,
        Category::VideoMedia,
        Category::VoiceTelephony,
        Category::WebhooksHttp,
        Category::FormsSurveys,
        Category::CrmSales,
        Category::SalesOutreach,
        Category::MarketingCampaigns,
        Category::SupportHelpdesk,
        Category::EcommercePayments,
        Category::HrRecruiting,
        Category::AnalyticsReporting,
        Category::ProjectTaskManagement,
        Category::FinanceInvoicing,
        Category::DocumentationKnowledge,
        Category::AiLlms,
        Category::RagVectorSearch,
        Category::SummarizationQa,
        Category::ClassificationRouting,
        Category::SeoContent,
        Category::DataExtractionScraping,
        Category::EtlDataPipelines,
        Category::GoogleWorkspace,
        Category::Spreadsheets,
        Category::DatabasesStorage,
        Category::DeveloperTools,
        Category::CloudDevops,
        Category::NotionKnowledgeTools,
        Category::AutomationOrchestration,
        Category::MonitoringAlerts,
        Category::Notifications,
        Category::SchedulingCalendar,
        Category::BackupSync,
        Category::UtilitiesHelpers,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EmailCommunication => "Email & Communication",
            Category::ChatMessaging => "Chat & Messaging",
            Category::SocialMedia => "Social Media",
            Category::VideoMedia => "Video & Media",
            Category::VoiceTelephony => "Voice & Telephony",
            Category::WebhooksHttp => "Webhooks & HTTP",
            Category::FormsSurveys => "Forms & Surveys",
            Category::CrmSales => "CRM & Sales",
            Category::SalesOutreach => "Sales & Outreach",
            Category::MarketingCampaigns => "Marketing & Campaigns",
            Category::SupportHelpdesk => "Support & Helpdesk",
            Category::EcommercePayments => "E-commerce & Payments",
            Category::HrRecruiting => "HR & Recruiting",
            Category::AnalyticsReporting => "Analytics & Reporting",
            Category::ProjectTaskManagement => "Project & Task Management",
            Category::FinanceInvoicing => "Finance & Invoicing",
            Category::DocumentationKnowledge => "Documentation & Knowledge",
            Category::AiLlms => "AI & LLMs",
            Category::RagVectorSearch => "RAG & Vector Search",
            Category::SummarizationQa => "Summarization & Q&A",
            Category::ClassificationRouting => "Classification & Routing",
            Category::SeoContent => "SEO & Content",
            Category::DataExtractionScraping => "Data Extraction & Scraping",
            Category::EtlDataPipelines => "ETL & Data Pipelines",
            Category::GoogleWorkspace => "Google Workspace",
            Category::Spreadsheets => "Spreadsheets",
            Category::DatabasesStorage => "Databases & Storage",
            Category::DeveloperTools => "Developer Tools",
            Category::CloudDevops => "Cloud & DevOps",
            Category::NotionKnowledgeTools => "Notion & Knowledge Tools",
            Category::AutomationOrchestration => "Automation & Orchestration",
            Category::MonitoringAlerts => "Monitoring & Alerts",
            Category::Notifications => "Notifications",
            Category::SchedulingCalendar => "Scheduling & Calendar",
            Category::BackupSync => "Backup & Sync",
            Category::UtilitiesHelpers => "Utilities & Helpers",
            Category::Other => "Other",
        }
    }

    /// Tie-break weight when several keywords match. Higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            Category::RagVectorSearch => 105,
            Category::AiLlms => 100,
            Category::SummarizationQa => 95,
            Category::ClassificationRouting => 92,
            Category::DataExtractionScraping => 90,
            Category::VoiceTelephony => 88,
            Category::CrmSales => 85,
            Category::SalesOutreach => 84,
            Category::SupportHelpdesk => 82,
            Category::EcommercePayments => 80,
            Category::FinanceInvoicing => 79,
            Category::HrRecruiting => 78,
            Category::MarketingCampaigns => 76,
            Category::SeoContent => 75,
            Category::SocialMedia => 74,
            Category::VideoMedia => 72,
            Category::EmailCommunication => 70,
            Category::ChatMessaging => 68,
            Category::FormsSurveys => 66,
            Category::ProjectTaskManagement => 64,
            Category::NotionKnowledgeTools => 62,
            Category::DocumentationKnowledge => 60,
            Category::AnalyticsReporting => 58,
            Category::EtlDataPipelines => 56,
            Category::GoogleWorkspace => 54,
            Category::Spreadsheets => 52,
            Category::DatabasesStorage => 50,
            Category::CloudDevops => 48,
            Category::DeveloperTools => 46,
            Category::MonitoringAlerts => 44,
            Category::SchedulingCalendar => 42,
            Category::BackupSync => 40,
            Category::Notifications => 38,
            Category::WebhooksHttp => 30,
            Category::UtilitiesHelpers => 20,
            Category::AutomationOrchestration => 10,
            Category::Other => 0,
        }
    }

    /// Exact label match, as stored in the database or returned by the model.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL.iter().copied().find(|c| c.as_str() == label)
    }

    /// Categories too generic to trust without a second opinion.
    pub fn is_generic(&self) -> bool {
        matches!(self, Category::AutomationOrchestration | Category::Other)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{}'", label)))
    }
}

/// A tag as it appears in API payloads: either a bare string or an object
/// carrying a `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
    Ignored(Value),
}

impl TagInput {
    pub fn name(&self) -> Option<&str> {
        match self {
            TagInput::Name(name) => Some(name.as_str()),
            TagInput::Object { name } => name.as_deref(),
            TagInput::Ignored(_) => None,
        }
    }
}

impl From<&str> for TagInput {
    fn from(value: &str) -> Self {
        TagInput::Name(value.to_string())
    }
}

/// Canonical template record, keyed by `source_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub source_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub nodes: Vec<Value>,
    pub raw_workflow: Value,
    pub source_url: String,
    pub node_type_counts: BTreeMap<String, u32>,
}

impl Template {
    pub fn category_label(&self) -> &'static str {
        self.category.map(|c| c.as_str()).unwrap_or("")
    }

    pub fn node_type_names(&self) -> Vec<String> {
        self.node_type_counts.keys().cloned().collect()
    }
}

/// A template row as read back from the store for the enrichment pass.
#[derive(Debug, Clone)]
pub struct StoredTemplate {
    pub id: i64,
    pub source_id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
}
