//! Keyword rules that map tags and free text onto a [`Category`].
//!
//! Tags are checked first, then the title and description. Across both, the
//! match with the highest [`Category::priority`] wins; between equal
//! priorities the first match seen is kept.

use crate::model::Category;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Spelling variants folded onto one token before lookup.
const VARIANTS: &[(&str, &str)] = &[
    ("llm", "ai"),
    ("llms", "ai"),
    ("gpt", "ai"),
    ("chatgpt", "ai"),
    ("openai", "ai"),
    ("artificial intelligence", "ai"),
    ("a i", "ai"),
    ("e mail", "email"),
    ("emails", "email"),
    ("crms", "crm"),
    ("webhooks", "webhook"),
    ("ecommerce", "e commerce"),
    ("ai agents", "ai agent"),
    ("spreadsheets", "spreadsheet"),
    ("notifications", "notification"),
];

const KEYWORDS: &[(&str, Category)] = &[
    // RAG & Vector Search
    ("rag", Category::RagVectorSearch),
    ("ai rag", Category::RagVectorSearch),
    ("vector", Category::RagVectorSearch),
    ("vector store", Category::RagVectorSearch),
    ("embedding", Category::RagVectorSearch),
    ("embeddings", Category::RagVectorSearch),
    ("pinecone", Category::RagVectorSearch),
    ("qdrant", Category::RagVectorSearch),
    ("weaviate", Category::RagVectorSearch),
    ("retrieval", Category::RagVectorSearch),
    // AI & LLMs
    ("ai", Category::AiLlms),
    ("ai agent", Category::AiLlms),
    ("ai chatbot", Category::AiLlms),
    ("multimodal ai", Category::AiLlms),
    ("langchain", Category::AiLlms),
    ("anthropic", Category::AiLlms),
    ("claude", Category::AiLlms),
    ("gemini", Category::AiLlms),
    ("mistral", Category::AiLlms),
    ("ollama", Category::AiLlms),
    ("prompt", Category::AiLlms),
    // Summarization & Q&A
    ("summarization", Category::SummarizationQa),
    ("ai summarization", Category::SummarizationQa),
    ("summarize", Category::SummarizationQa),
    ("summary", Category::SummarizationQa),
    ("q&a", Category::SummarizationQa),
    ("question answering", Category::SummarizationQa),
    // Classification & Routing
    ("classification", Category::ClassificationRouting),
    ("classify", Category::ClassificationRouting),
    ("routing", Category::ClassificationRouting),
    ("triage", Category::ClassificationRouting),
    ("sentiment", Category::ClassificationRouting),
    // Data Extraction & Scraping
    ("scraping", Category::DataExtractionScraping),
    ("web scraping", Category::DataExtractionScraping),
    ("scraper", Category::DataExtractionScraping),
    ("crawler", Category::DataExtractionScraping),
    ("extraction", Category::DataExtractionScraping),
    ("ocr", Category::DataExtractionScraping),
    ("apify", Category::DataExtractionScraping),
    ("firecrawl", Category::DataExtractionScraping),
    // Voice & Telephony
    ("voice", Category::VoiceTelephony),
    ("telephony", Category::VoiceTelephony),
    ("twilio", Category::VoiceTelephony),
    ("vapi", Category::VoiceTelephony),
    ("sms", Category::VoiceTelephony),
    ("phone", Category::VoiceTelephony),
    ("speech", Category::VoiceTelephony),
    ("transcription", Category::VoiceTelephony),
    ("elevenlabs", Category::VoiceTelephony),
    // CRM & Sales
    ("crm", Category::CrmSales),
    ("hubspot", Category::CrmSales),
    ("salesforce", Category::CrmSales),
    ("pipedrive", Category::CrmSales),
    ("zoho crm", Category::CrmSales),
    ("deal", Category::CrmSales),
    ("deals", Category::CrmSales),
    ("contacts", Category::CrmSales),
    // Sales & Outreach
    ("sales", Category::SalesOutreach),
    ("lead", Category::SalesOutreach),
    ("leads", Category::SalesOutreach),
    ("lead generation", Category::SalesOutreach),
    ("outreach", Category::SalesOutreach),
    ("prospecting", Category::SalesOutreach),
    ("cold email", Category::SalesOutreach),
    // Support & Helpdesk
    ("support", Category::SupportHelpdesk),
    ("helpdesk", Category::SupportHelpdesk),
    ("ticket", Category::SupportHelpdesk),
    ("tickets", Category::SupportHelpdesk),
    ("ticket management", Category::SupportHelpdesk),
    ("zendesk", Category::SupportHelpdesk),
    ("freshdesk", Category::SupportHelpdesk),
    ("intercom", Category::SupportHelpdesk),
    ("customer support", Category::SupportHelpdesk),
    // E-commerce & Payments
    ("e commerce", Category::EcommercePayments),
    ("shopify", Category::EcommercePayments),
    ("woocommerce", Category::EcommercePayments),
    ("stripe", Category::EcommercePayments),
    ("payment", Category::EcommercePayments),
    ("payments", Category::EcommercePayments),
    ("checkout", Category::EcommercePayments),
    ("paypal", Category::EcommercePayments),
    // Finance & Invoicing
    ("finance", Category::FinanceInvoicing),
    ("invoice", Category::FinanceInvoicing),
    ("invoices", Category::FinanceInvoicing),
    ("invoice processing", Category::FinanceInvoicing),
    ("invoicing", Category::FinanceInvoicing),
    ("accounting", Category::FinanceInvoicing),
    ("quickbooks", Category::FinanceInvoicing),
    ("xero", Category::FinanceInvoicing),
    ("expense", Category::FinanceInvoicing),
    ("expenses", Category::FinanceInvoicing),
    ("crypto", Category::FinanceInvoicing),
    ("crypto trading", Category::FinanceInvoicing),
    // HR & Recruiting
    ("hr", Category::HrRecruiting),
    ("recruiting", Category::HrRecruiting),
    ("recruitment", Category::HrRecruiting),
    ("hiring", Category::HrRecruiting),
    ("resume", Category::HrRecruiting),
    ("candidate", Category::HrRecruiting),
    ("candidates", Category::HrRecruiting),
    ("onboarding", Category::HrRecruiting),
    ("interview", Category::HrRecruiting),
    // Marketing & Campaigns
    ("marketing", Category::MarketingCampaigns),
    ("campaign", Category::MarketingCampaigns),
    ("campaigns", Category::MarketingCampaigns),
    ("mailchimp", Category::MarketingCampaigns),
    ("newsletter", Category::MarketingCampaigns),
    ("ads", Category::MarketingCampaigns),
    ("advertising", Category::MarketingCampaigns),
    ("market research", Category::MarketingCampaigns),
    // SEO & Content
    ("seo", Category::SeoContent),
    ("content", Category::SeoContent),
    ("content creation", Category::SeoContent),
    ("blog", Category::SeoContent),
    ("copywriting", Category::SeoContent),
    ("wordpress", Category::SeoContent),
    ("article", Category::SeoContent),
    ("articles", Category::SeoContent),
    // Social Media
    ("social media", Category::SocialMedia),
    ("twitter", Category::SocialMedia),
    ("linkedin", Category::SocialMedia),
    ("instagram", Category::SocialMedia),
    ("facebook", Category::SocialMedia),
    ("tiktok", Category::SocialMedia),
    ("reddit", Category::SocialMedia),
    ("bluesky", Category::SocialMedia),
    // Video & Media
    ("video", Category::VideoMedia),
    ("youtube", Category::VideoMedia),
    ("image", Category::VideoMedia),
    ("images", Category::VideoMedia),
    ("media", Category::VideoMedia),
    ("podcast", Category::VideoMedia),
    ("audio", Category::VideoMedia),
    // Email & Communication
    ("email", Category::EmailCommunication),
    ("gmail", Category::EmailCommunication),
    ("outlook", Category::EmailCommunication),
    ("smtp", Category::EmailCommunication),
    ("imap", Category::EmailCommunication),
    ("inbox", Category::EmailCommunication),
    // Chat & Messaging
    ("chat", Category::ChatMessaging),
    ("slack", Category::ChatMessaging),
    ("telegram", Category::ChatMessaging),
    ("discord", Category::ChatMessaging),
    ("whatsapp", Category::ChatMessaging),
    ("messaging", Category::ChatMessaging),
    ("microsoft teams", Category::ChatMessaging),
    // Forms & Surveys
    ("form", Category::FormsSurveys),
    ("forms", Category::FormsSurveys),
    ("survey", Category::FormsSurveys),
    ("surveys", Category::FormsSurveys),
    ("typeform", Category::FormsSurveys),
    ("jotform", Category::FormsSurveys),
    ("google forms", Category::FormsSurveys),
    // Project & Task Management
    ("project management", Category::ProjectTaskManagement),
    ("task", Category::ProjectTaskManagement),
    ("tasks", Category::ProjectTaskManagement),
    ("jira", Category::ProjectTaskManagement),
    ("asana", Category::ProjectTaskManagement),
    ("trello", Category::ProjectTaskManagement),
    ("clickup", Category::ProjectTaskManagement),
    ("todoist", Category::ProjectTaskManagement),
    // Notion & Knowledge Tools
    ("notion", Category::NotionKnowledgeTools),
    ("obsidian", Category::NotionKnowledgeTools),
    ("confluence", Category::NotionKnowledgeTools),
    ("coda", Category::NotionKnowledgeTools),
    // Documentation & Knowledge
    ("documentation", Category::DocumentationKnowledge),
    ("docs", Category::DocumentationKnowledge),
    ("knowledge base", Category::DocumentationKnowledge),
    ("wiki", Category::DocumentationKnowledge),
    ("internal wiki", Category::DocumentationKnowledge),
    ("document ops", Category::DocumentationKnowledge),
    ("document", Category::DocumentationKnowledge),
    ("documents", Category::DocumentationKnowledge),
    ("pdf", Category::DocumentationKnowledge),
    // Analytics & Reporting
    ("analytics", Category::AnalyticsReporting),
    ("reporting", Category::AnalyticsReporting),
    ("report", Category::AnalyticsReporting),
    ("reports", Category::AnalyticsReporting),
    ("dashboard", Category::AnalyticsReporting),
    ("metrics", Category::AnalyticsReporting),
    ("google analytics", Category::AnalyticsReporting),
    ("kpi", Category::AnalyticsReporting),
    // ETL & Data Pipelines
    ("etl", Category::EtlDataPipelines),
    ("data pipeline", Category::EtlDataPipelines),
    ("pipeline", Category::EtlDataPipelines),
    ("data transformation", Category::EtlDataPipelines),
    ("bigquery", Category::EtlDataPipelines),
    ("snowflake", Category::EtlDataPipelines),
    // Google Workspace
    ("google workspace", Category::GoogleWorkspace),
    ("google drive", Category::GoogleWorkspace),
    ("google docs", Category::GoogleWorkspace),
    ("gdrive", Category::GoogleWorkspace),
    // Spreadsheets
    ("spreadsheet", Category::Spreadsheets),
    ("google sheets", Category::Spreadsheets),
    ("sheets", Category::Spreadsheets),
    ("excel", Category::Spreadsheets),
    ("airtable", Category::Spreadsheets),
    ("csv", Category::Spreadsheets),
    // Databases & Storage
    ("database", Category::DatabasesStorage),
    ("databases", Category::DatabasesStorage),
    ("postgres", Category::DatabasesStorage),
    ("postgresql", Category::DatabasesStorage),
    ("mysql", Category::DatabasesStorage),
    ("mongodb", Category::DatabasesStorage),
    ("supabase", Category::DatabasesStorage),
    ("redis", Category::DatabasesStorage),
    ("s3", Category::DatabasesStorage),
    ("storage", Category::DatabasesStorage),
    ("sql", Category::DatabasesStorage),
    // Cloud & DevOps
    ("devops", Category::CloudDevops),
    ("it ops", Category::CloudDevops),
    ("secops", Category::CloudDevops),
    ("aws", Category::CloudDevops),
    ("azure", Category::CloudDevops),
    ("gcp", Category::CloudDevops),
    ("kubernetes", Category::CloudDevops),
    ("docker", Category::CloudDevops),
    ("deploy", Category::CloudDevops),
    ("deployment", Category::CloudDevops),
    ("server", Category::CloudDevops),
    // Developer Tools
    ("developer", Category::DeveloperTools),
    ("engineering", Category::DeveloperTools),
    ("github", Category::DeveloperTools),
    ("gitlab", Category::DeveloperTools),
    ("git", Category::DeveloperTools),
    ("api", Category::DeveloperTools),
    ("code", Category::DeveloperTools),
    ("coding", Category::DeveloperTools),
    // Monitoring & Alerts
    ("monitoring", Category::MonitoringAlerts),
    ("monitor", Category::MonitoringAlerts),
    ("alert", Category::MonitoringAlerts),
    ("alerts", Category::MonitoringAlerts),
    ("uptime", Category::MonitoringAlerts),
    ("incident", Category::MonitoringAlerts),
    // Scheduling & Calendar
    ("calendar", Category::SchedulingCalendar),
    ("google calendar", Category::SchedulingCalendar),
    ("scheduling", Category::SchedulingCalendar),
    ("meeting", Category::SchedulingCalendar),
    ("meetings", Category::SchedulingCalendar),
    ("appointment", Category::SchedulingCalendar),
    ("calendly", Category::SchedulingCalendar),
    // Backup & Sync
    ("backup", Category::BackupSync),
    ("backups", Category::BackupSync),
    ("sync", Category::BackupSync),
    ("synchronization", Category::BackupSync),
    ("file management", Category::BackupSync),
    ("dropbox", Category::BackupSync),
    ("onedrive", Category::BackupSync),
    // Notifications
    ("notification", Category::Notifications),
    ("notify", Category::Notifications),
    ("reminder", Category::Notifications),
    ("reminders", Category::Notifications),
    ("pushover", Category::Notifications),
    // Webhooks & HTTP
    ("webhook", Category::WebhooksHttp),
    ("http", Category::WebhooksHttp),
    ("http request", Category::WebhooksHttp),
    ("rest api", Category::WebhooksHttp),
    // Utilities & Helpers
    ("utility", Category::UtilitiesHelpers),
    ("utilities", Category::UtilitiesHelpers),
    ("helper", Category::UtilitiesHelpers),
    ("productivity", Category::UtilitiesHelpers),
    ("personal productivity", Category::UtilitiesHelpers),
    // Automation & Orchestration
    ("automation", Category::AutomationOrchestration),
    ("orchestration", Category::AutomationOrchestration),
    ("workflow", Category::AutomationOrchestration),
    ("workflows", Category::AutomationOrchestration),
    ("n8n", Category::AutomationOrchestration),
    // Other
    ("other", Category::Other),
    ("miscellaneous", Category::Other),
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "on", "for", "with", "by", "at", "from",
    "is", "are", "be", "this", "that", "these", "those", "your", "my", "our", "their", "using",
    "use", "into",
];

fn keyword_table() -> &'static HashMap<&'static str, Category> {
    static TABLE: OnceLock<HashMap<&'static str, Category>> = OnceLock::new();
    TABLE.get_or_init(|| KEYWORDS.iter().copied().collect())
}

fn variant_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| VARIANTS.iter().copied().collect())
}

/// Lowercase, trim, fold separators into single spaces and collapse known
/// spelling variants.
pub fn normalize_tag_token(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let folded = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match variant_table().get(folded.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => folded,
    }
}

/// Category mapped to a single already-normalized token, if any.
pub fn lookup_token(token: &str) -> Option<Category> {
    keyword_table().get(token).copied()
}

/// Keeps the best match seen so far.
#[derive(Debug, Default)]
struct BestMatch(Option<Category>);

impl BestMatch {
    fn offer(&mut self, candidate: Option<Category>) {
        if let Some(candidate) = candidate {
            match self.0 {
                Some(current) if candidate.priority() <= current.priority() => {}
                _ => self.0 = Some(candidate),
            }
        }
    }
}

fn text_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Derive a category from tags first, then from title and description.
///
/// Returns `None` when nothing matches; callers may then ask the language
/// model.
pub fn derive_category<S: AsRef<str>>(tags: &[S], title: &str, description: &str) -> Option<Category> {
    let mut best = BestMatch::default();

    for tag in tags {
        let token = normalize_tag_token(tag.as_ref());
        if token.is_empty() {
            continue;
        }
        best.offer(lookup_token(&token));
    }

    let tokens = text_tokens(&format!("{} {}", title, description));
    for (i, token) in tokens.iter().enumerate() {
        let token = normalize_tag_token(token);
        best.offer(lookup_token(&token));
        if let Some(next) = tokens.get(i + 1) {
            let bigram = normalize_tag_token(&format!("{} {}", token, next));
            best.offer(lookup_token(&bigram));
        }
    }

    best.0
}

/// Map a free-form label (for example an upstream category name) onto the
/// closed set: exact label first, then keyword rules.
pub fn category_for_label(label: &str) -> Option<Category> {
    Category::from_label(label).or_else(|| derive_category(&[label], "", ""))
}

/// Trim tags, drop empties and duplicates, keep first-seen order.
pub fn dedupe_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || !seen.insert(tag.to_string()) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

/// Order-preserving union of two tag lists.
pub fn merge_tags(primary: &[String], derived: &[String]) -> Vec<String> {
    dedupe_tags(primary.iter().chain(derived.iter()))
}

/// Cheap keyword tags from title and description: alphanumeric tokens of
/// three or more characters that are not stopwords, first `max_tags` kept.
pub fn derive_keyword_tags(title: &str, description: &str, max_tags: usize) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in text_tokens(&format!("{} {}", title, description)) {
        if tags.len() >= max_tags {
            break;
        }
        if token.len() < 3 || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !tags.contains(&token) {
            tags.push(token);
        }
    }
    tags
}
