//! Fixed vocabulary tables mapping federal solicitation language onto the
//! applicant's focus areas and technical capability categories.

/// A focus area plus the synonym phrases that count as a semantic match.
#[derive(Debug, Clone, Copy)]
pub struct FocusArea {
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
}

/// Applicant focus areas used for mission-fit scoring. A focus area matches
/// when either its name or any synonym appears in the opportunity text.
pub const FOCUS_AREAS: &[FocusArea] = &[
    FocusArea {
        name: "AI workflows",
        synonyms: &["artificial intelligence", "ai/ml", "llm integration", "decision automation"],
    },
    FocusArea {
        name: "data governance",
        synonyms: &["data management", "data quality", "data stewardship"],
    },
    FocusArea {
        name: "agent configuration",
        synonyms: &["autonomous agents", "agentic workflows"],
    },
    FocusArea {
        name: "decision support",
        synonyms: &["business intelligence", "analytics dashboards", "predictive analytics"],
    },
    FocusArea {
        name: "workflow automation",
        synonyms: &["process automation", "workflow orchestration", "task automation"],
    },
    FocusArea {
        name: "machine learning operations",
        synonyms: &["mlops", "model deployment", "model training"],
    },
    FocusArea {
        name: "data pipeline",
        synonyms: &["etl pipelines", "data integration", "secure data pipelines"],
    },
    FocusArea {
        name: "cloud-native",
        synonyms: &["cloud computing", "cloud migration", "serverless", "kubernetes"],
    },
    FocusArea {
        name: "api development",
        synonyms: &["microservices", "systems integration", "application development"],
    },
    FocusArea {
        name: "devops",
        synonyms: &["ci/cd", "infrastructure as code", "infrastructure automation"],
    },
];

/// Core terminology that earns the mission-fit boost when mentioned.
pub const CORE_AI_TERMS: &[&str] = &["ai/ml", "artificial intelligence", "machine learning", "mlops"];

#[derive(Debug, Clone, Copy)]
pub struct SemanticCategory {
    pub name: &'static str,
    pub terms: &'static [&'static str],
}

/// Technical capability categories for alignment scoring; breadth across
/// categories matters more than repeats within one.
pub const SEMANTIC_CATEGORIES: &[SemanticCategory] = &[
    SemanticCategory {
        name: "cyberinfrastructure",
        terms: &["data governance", "secure data pipelines", "infrastructure automation", "data architecture", "data platforms"],
    },
    SemanticCategory {
        name: "data management",
        terms: &["etl pipelines", "data quality", "data integration", "data warehousing", "data lakes"],
    },
    SemanticCategory {
        name: "data science",
        terms: &["machine learning", "predictive analytics", "statistical modeling", "data analysis", "business intelligence"],
    },
    SemanticCategory {
        name: "artificial intelligence",
        terms: &["neural networks", "deep learning", "llm integration", "natural language processing", "computer vision"],
    },
    SemanticCategory {
        name: "automation",
        terms: &["agent configuration", "workflow orchestration", "devops", "ci/cd", "infrastructure as code", "process automation"],
    },
    SemanticCategory {
        name: "cloud computing",
        terms: &["aws", "azure", "gcp", "cloud-native", "serverless", "cloud migration", "kubernetes", "containers"],
    },
    SemanticCategory {
        name: "software development",
        terms: &["application development", "api development", "microservices", "full-stack", "agile development"],
    },
    SemanticCategory {
        name: "cybersecurity",
        terms: &["security architecture", "threat detection", "security monitoring", "compliance automation", "encryption", "access control"],
    },
    SemanticCategory {
        name: "research and development",
        terms: &["innovation", "proof of concept", "prototyping", "experimental development", "emerging technologies"],
    },
    SemanticCategory {
        name: "digital transformation",
        terms: &["modernization", "digital services", "legacy system migration", "federal modernization", "government cloud"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabMatch {
    pub category: &'static str,
    pub term: &'static str,
    pub context: String,
}

/// Find every distinct (category, term) pair present in the text, with a
/// near-verbatim context snippet for evidence citations.
pub fn find_semantic_matches(text: &str) -> Vec<VocabMatch> {
    if text.is_empty() {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let mut matches = Vec::new();

    for category in SEMANTIC_CATEGORIES {
        for &term in category.terms {
            if lower.contains(term) {
                matches.push(VocabMatch {
                    category: category.name,
                    term,
                    context: extract_context(text, term, 100),
                });
            }
        }
    }

    matches
}

/// Focus areas matched directly or through one of their synonyms.
pub fn matched_focus_areas(text: &str) -> Vec<(&'static str, String)> {
    if text.is_empty() {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let mut matched = Vec::new();

    for area in FOCUS_AREAS {
        let hit = if lower.contains(&area.name.to_lowercase()) {
            Some(area.name)
        } else {
            area.synonyms.iter().copied().find(|syn| lower.contains(syn))
        };
        if let Some(term) = hit {
            matched.push((area.name, extract_context(text, term, 100)));
        }
    }

    matched
}

/// Context window around the first occurrence of `keyword`, ellipsized when
/// truncated. Case-insensitive lookup, original casing preserved.
pub fn extract_context(text: &str, keyword: &str, window: usize) -> String {
    let lower = text.to_lowercase();
    let keyword_lower = keyword.to_lowercase();
    let Some(idx) = lower.find(&keyword_lower) else {
        return String::new();
    };

    let start = idx.saturating_sub(window);
    let end = (idx + keyword_lower.len() + window).min(text.len());
    // Snap to char boundaries so slicing cannot panic on multibyte text.
    let start = (0..=start).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    let end = (end..=text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());

    let mut context = text[start..end].trim().to_string();
    if start > 0 {
        context = format!("...{context}");
    }
    if end < text.len() {
        context.push_str("...");
    }
    context
}
