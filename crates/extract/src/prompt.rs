use serde::{Deserialize, Serialize};

/// Language the free-text answer fields should be written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Bengali,
}

impl Language {
    /// Lenient selector: unknown or absent values fall back to English.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("bn") | Some("bangla") | Some("bengali") => Language::Bengali,
            _ => Language::English,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Bengali => "Bengali",
        }
    }
}

pub fn build_triage_prompt(symptoms: &str, language: Language) -> String {
    format!(
        r#"You are a medical triage assistant. A patient describes their symptoms below.

INSTRUCTIONS:
1. Assess how urgently the patient needs care
2. List the most likely conditions
3. Recommend the kind of specialist to see
4. Give short practical advice and first aid steps
5. Write all free-text values in {language}; keep field names and enum values in English
6. Output ONLY valid JSON, nothing else

SCHEMA:
{{
  "urgency": "LOW|MEDIUM|HIGH",
  "possible_conditions": ["condition"],
  "recommended_specialist": "specialist type",
  "advice": "what the patient should do next",
  "first_aid": ["step"],
  "search_query": "search keyword for finding this specialist, e.g. Best Cardiologist"
}}

RULES:
- urgency must be one of: LOW, MEDIUM, HIGH
- Use HIGH for anything that may be life threatening
- search_query is a short keyword for a map search, without a location
- Output ONLY the JSON object, no markdown, no explanations

SYMPTOMS:
{symptoms}

JSON OUTPUT:"#,
        language = language.name(),
        symptoms = symptoms,
    )
}

pub fn build_blood_request_prompt(text: &str) -> String {
    format!(
        r#"You are a blood donation request parser. Read the request below and pull out its details.

INSTRUCTIONS:
1. Identify the blood group, amount and where it is needed
2. Use null for any detail the request does not mention
3. Output ONLY valid JSON, nothing else

SCHEMA:
{{
  "blood_group": "A+|A-|B+|B-|AB+|AB-|O+|O-",
  "units": 1,
  "hospital": "hospital name",
  "location": "area or city",
  "urgency": "LOW|MEDIUM|HIGH",
  "contact": "phone number or contact person",
  "patient_condition": "short description",
  "needed_by": "when the blood is needed"
}}

RULES:
- blood_group must be one of: A+, A-, B+, B-, AB+, AB-, O+, O-
- units is the number of bags as a number
- urgency must be one of: LOW, MEDIUM, HIGH
- Output ONLY the JSON object, no markdown, no explanations

REQUEST:
{text}

JSON OUTPUT:"#,
        text = text,
    )
}

pub fn build_history_prompt(history: &[serde_json::Value], language: Language) -> String {
    let history_json =
        serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a medical history summarizer. Below is a patient's list of past consultations.

INSTRUCTIONS:
1. Summarize the patient's history in a few sentences
2. Point out symptoms that keep coming back
3. Judge the overall risk level
4. Write all free-text values in {language}; keep field names and enum values in English
5. Output ONLY valid JSON, nothing else

SCHEMA:
{{
  "summary": "short summary",
  "recurring_symptoms": ["symptom"],
  "risk_level": "LOW|MEDIUM|HIGH",
  "recommendations": ["recommendation"]
}}

RULES:
- risk_level must be one of: LOW, MEDIUM, HIGH
- Output ONLY the JSON object, no markdown, no explanations

HISTORY:
{history}

JSON OUTPUT:"#,
        language = language.name(),
        history = history_json,
    )
}
