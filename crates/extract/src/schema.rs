use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Urgency level shared by the triage, blood request and history contracts.
///
/// Values outside the contract decode to `Unknown` and serialize back to
/// the raw text the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Unknown(String),
}

impl From<String> for Urgency {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "LOW" => Urgency::Low,
            "MEDIUM" => Urgency::Medium,
            "HIGH" => Urgency::High,
            _ => Urgency::Unknown(raw),
        }
    }
}

impl From<Urgency> for String {
    fn from(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Low => "LOW".to_string(),
            Urgency::Medium => "MEDIUM".to_string(),
            Urgency::High => "HIGH".to_string(),
            Urgency::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BloodGroup {
    APos,
    ANeg,
    BPos,
    BNeg,
    AbPos,
    AbNeg,
    OPos,
    ONeg,
    Unknown(String),
}

impl From<String> for BloodGroup {
    fn from(raw: String) -> Self {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        match compact.as_str() {
            "A+" => BloodGroup::APos,
            "A-" => BloodGroup::ANeg,
            "B+" => BloodGroup::BPos,
            "B-" => BloodGroup::BNeg,
            "AB+" => BloodGroup::AbPos,
            "AB-" => BloodGroup::AbNeg,
            "O+" => BloodGroup::OPos,
            "O-" => BloodGroup::ONeg,
            _ => BloodGroup::Unknown(raw),
        }
    }
}

impl From<BloodGroup> for String {
    fn from(group: BloodGroup) -> Self {
        let label = match group {
            BloodGroup::APos => "A+",
            BloodGroup::ANeg => "A-",
            BloodGroup::BPos => "B+",
            BloodGroup::BNeg => "B-",
            BloodGroup::AbPos => "AB+",
            BloodGroup::AbNeg => "AB-",
            BloodGroup::OPos => "O+",
            BloodGroup::ONeg => "O-",
            BloodGroup::Unknown(raw) => return raw,
        };
        label.to_string()
    }
}

/// A contract field as the model sent it: either the expected type, or
/// whatever valid JSON came back instead. Decoding a field never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Typed(T),
    Mistyped(Value),
}

impl<T> Lenient<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Lenient::Typed(value) => Some(value),
            Lenient::Mistyped(_) => None,
        }
    }
}

impl Lenient<String> {
    /// Best-effort text form, also for mistyped scalars and string arrays.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Lenient::Typed(text) => text.clone(),
            Lenient::Mistyped(Value::String(text)) => text.clone(),
            Lenient::Mistyped(Value::Number(n)) => n.to_string(),
            Lenient::Mistyped(Value::Bool(b)) => b.to_string(),
            Lenient::Mistyped(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
            Lenient::Mistyped(_) => return None,
        };
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient::Typed(value)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match T::deserialize(&value) {
            Ok(typed) => Lenient::Typed(typed),
            Err(_) => Lenient::Mistyped(value),
        })
    }
}

impl<T: Serialize> Serialize for Lenient<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Lenient::Typed(value) => value.serialize(serializer),
            Lenient::Mistyped(value) => value.serialize(serializer),
        }
    }
}

/// Reports where a decoded record strays from the output contract the
/// prompt asked for. Strays are logged, not rejected.
pub trait ContractCheck {
    fn violations(&self) -> Vec<String>;
}

/// Missing and mistyped fields. `required` fields are also reported when absent.
fn check<T>(violations: &mut Vec<String>, field: &str, value: &Option<Lenient<T>>, required: bool) {
    match value {
        None if required => violations.push(format!("missing field `{}`", field)),
        Some(Lenient::Mistyped(raw)) => {
            violations.push(format!("`{}` has unexpected type: {}", field, raw))
        }
        _ => {}
    }
}

fn check_urgency(violations: &mut Vec<String>, field: &str, value: &Option<Lenient<Urgency>>, required: bool) {
    check(violations, field, value, required);
    if let Some(Lenient::Typed(Urgency::Unknown(raw))) = value {
        violations.push(format!("`{}` has out-of-contract value {:?}", field, raw));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Lenient<Urgency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_conditions: Option<Lenient<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_specialist: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_aid: Option<Lenient<Vec<String>>>,
    /// Keyword used to build the place search query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<Lenient<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriageRecord {
    pub fn search_keyword(&self) -> Option<String> {
        self.search_query.as_ref().and_then(Lenient::as_text)
    }
}

impl ContractCheck for TriageRecord {
    fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        check_urgency(&mut v, "urgency", &self.urgency, true);
        check(&mut v, "possible_conditions", &self.possible_conditions, true);
        check(&mut v, "recommended_specialist", &self.recommended_specialist, true);
        check(&mut v, "advice", &self.advice, true);
        check(&mut v, "first_aid", &self.first_aid, false);
        check(&mut v, "search_query", &self.search_query, true);
        v
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BloodRequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<Lenient<BloodGroup>>,
    /// Kept as raw JSON: models answer with `2` as often as `"2 bags"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Lenient<Urgency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_condition: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needed_by: Option<Lenient<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractCheck for BloodRequestRecord {
    fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        check(&mut v, "blood_group", &self.blood_group, true);
        if let Some(Lenient::Typed(BloodGroup::Unknown(raw))) = &self.blood_group {
            v.push(format!("`blood_group` has out-of-contract value {:?}", raw));
        }
        check(&mut v, "hospital", &self.hospital, false);
        check(&mut v, "location", &self.location, false);
        check_urgency(&mut v, "urgency", &self.urgency, false);
        check(&mut v, "contact", &self.contact, false);
        check(&mut v, "patient_condition", &self.patient_condition, false);
        check(&mut v, "needed_by", &self.needed_by, false);
        v
    }
}

/// Shape the history summary is expected to have. The route forwards the
/// model text verbatim, so this type is only used to audit it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Lenient<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_symptoms: Option<Lenient<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<Lenient<Urgency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Lenient<Vec<String>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractCheck for HistorySummary {
    fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        check(&mut v, "summary", &self.summary, true);
        check(&mut v, "recurring_symptoms", &self.recurring_symptoms, false);
        check_urgency(&mut v, "risk_level", &self.risk_level, true);
        check(&mut v, "recommendations", &self.recommendations, false);
        v
    }
}
