use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use super::{
    pagination::{self, Page},
    time_range::{self, TimeBoundary},
};
use crate::models::filters::{FilterSet, SortOrder, present};

const TIMESTAMP_FIELD: &str = "@timestamp";
const DESCRIPTION_FIELD: &str = "rule.description";
const DESCRIPTION_KEYWORD_FIELD: &str = "rule.description.keyword";
const FIM_EVENTS_SIZE: u64 = 50;

const FREE_TEXT_FIELDS: [&str; 9] = [
    "rule.description^3",
    "full_log",
    "data.*",
    "agent.name",
    "agent.id",
    "manager.name",
    "rule.id",
    "rule.groups",
    "rule.mitre.*",
];

static QUERY_STRING_SPECIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[+\-=&|<>!(){}\[\]^"~*?:\\/]"#).expect("query_string escape pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Must,
    Filter,
    Should,
}

/// A single clause together with the bool role it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub role: Role,
    pub body: Value,
}

impl Clause {
    fn must(body: Value) -> Self {
        Self { role: Role::Must, body }
    }

    fn filter(body: Value) -> Self {
        Self {
            role: Role::Filter,
            body,
        }
    }

    fn should(body: Value) -> Self {
        Self {
            role: Role::Should,
            body,
        }
    }
}

type Dimension = fn(&FilterSet) -> Vec<Clause>;

/// Evaluation order of the filter dimensions; clause order in the final
/// query follows it.
const DIMENSIONS: [Dimension; 6] = [
    time_clauses,
    identity_clauses,
    rule_id_clauses,
    severity_clauses,
    description_clauses,
    free_text_clauses,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredQuery {
    pub must: Vec<Value>,
    pub filter: Vec<Value>,
    pub should: Vec<Value>,
}

impl StructuredQuery {
    pub fn from_clauses(clauses: impl IntoIterator<Item = Clause>) -> Self {
        clauses
            .into_iter()
            .fold(Self::default(), |mut query, clause| {
                match clause.role {
                    Role::Must => query.must.push(clause.body),
                    Role::Filter => query.filter.push(clause.body),
                    Role::Should => query.should.push(clause.body),
                }
                query
            })
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.filter.is_empty() && self.should.is_empty()
    }

    pub fn to_json(&self) -> Value {
        if self.is_empty() {
            return json!({ "match_all": {} });
        }

        let mut bool_query = serde_json::Map::new();
        if !self.must.is_empty() {
            bool_query.insert("must".into(), Value::Array(self.must.clone()));
        }
        if !self.filter.is_empty() {
            bool_query.insert("filter".into(), Value::Array(self.filter.clone()));
        }
        if !self.should.is_empty() {
            bool_query.insert("should".into(), Value::Array(self.should.clone()));
            bool_query.insert("minimum_should_match".into(), json!(1));
        }
        json!({ "bool": bool_query })
    }
}

/// Body posted to `<index>/_search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchBody {
    pub track_total_hits: bool,
    pub query: Value,
    pub sort: Vec<Value>,
    pub from: u64,
    pub size: u64,
}

impl SearchBody {
    fn new(query: &StructuredQuery, order: SortOrder, page: Page) -> Self {
        Self {
            track_total_hits: true,
            query: query.to_json(),
            sort: vec![json!({ TIMESTAMP_FIELD: { "order": order.as_str() } })],
            from: page.offset,
            size: page.size,
        }
    }
}

pub fn structured_query(filters: &FilterSet) -> StructuredQuery {
    StructuredQuery::from_clauses(DIMENSIONS.iter().flat_map(|dimension| dimension(filters)))
}

/// Builds the hunting search body. Never fails: unusable parameters drop
/// their clause.
pub fn synthesize(filters: &FilterSet) -> SearchBody {
    let page = pagination::resolve(filters.page.as_deref(), filters.size.as_deref());
    let order = SortOrder::from_param(filters.sort.as_deref());
    SearchBody::new(&structured_query(filters), order, page)
}

/// Latest file-integrity alerts for one agent.
pub fn syscheck_events(agent_id: &str) -> SearchBody {
    let query = StructuredQuery::from_clauses([
        Clause::must(match_clause("rule.groups", "syscheck")),
        Clause::must(match_clause("agent.id", agent_id)),
    ]);
    let page = Page {
        page: 1,
        size: FIM_EVENTS_SIZE,
        offset: 0,
    };
    SearchBody::new(&query, SortOrder::Desc, page)
}

fn time_clauses(filters: &FilterSet) -> Vec<Clause> {
    time_range::build_range(filters.start.as_deref(), filters.end.as_deref())
        .map(|boundary| Clause::filter(timestamp_range(&boundary)))
        .into_iter()
        .collect()
}

fn timestamp_range(boundary: &TimeBoundary) -> Value {
    let mut range = serde_json::Map::new();
    if let Some(gte) = boundary.gte {
        range.insert("gte".into(), json!(time_range::canonical(gte)));
    }
    if let Some(lte) = boundary.lte {
        range.insert("lte".into(), json!(time_range::canonical(lte)));
    }
    json!({ "range": { TIMESTAMP_FIELD: range } })
}

fn identity_clauses(filters: &FilterSet) -> Vec<Clause> {
    let mut clauses = Vec::new();
    if let Some(agent_id) = present(&filters.agent_id) {
        clauses.push(Clause::filter(term_clause("agent.id", agent_id)));
    }
    let text_fields = [
        ("agent.name", &filters.agent_name),
        ("manager.name", &filters.manager_name),
        ("rule.groups", &filters.group),
    ];
    for (field, value) in text_fields {
        if let Some(value) = present(value) {
            clauses.push(Clause::filter(match_clause(field, value)));
        }
    }
    clauses
}

/// Rule ids are stored as keyword in some indices and as text in others,
/// so both variants are offered with equal weight.
fn rule_id_clauses(filters: &FilterSet) -> Vec<Clause> {
    match present(&filters.rule_id) {
        Some(rule_id) => vec![
            Clause::should(term_clause("rule.id", rule_id)),
            Clause::should(match_clause("rule.id", rule_id)),
        ],
        None => Vec::new(),
    }
}

fn severity_clauses(filters: &FilterSet) -> Vec<Clause> {
    let mut range = serde_json::Map::new();
    if let Some(gte) = parse_level(&filters.level_gte) {
        range.insert("gte".into(), gte);
    }
    if let Some(lte) = parse_level(&filters.level_lte) {
        range.insert("lte".into(), lte);
    }
    if range.is_empty() {
        return Vec::new();
    }
    vec![Clause::filter(json!({ "range": { "rule.level": range } }))]
}

fn parse_level(raw: &Option<String>) -> Option<Value> {
    let raw = present(raw)?;
    if let Ok(level) = raw.parse::<i64>() {
        return Some(json!(level));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Short fragments should behave like a log viewer search, so the fragment is
/// offered to several matchers and any one of them is enough.
fn description_clauses(filters: &FilterSet) -> Vec<Clause> {
    let Some(text) = present(&filters.desc) else {
        return Vec::new();
    };
    let contains = format!("*{text}*");

    let strategies = vec![
        json!({
            "multi_match": {
                "query": text,
                "type": "best_fields",
                "operator": "or",
                "fuzziness": "AUTO",
                "fields": [format!("{DESCRIPTION_FIELD}^3")]
            }
        }),
        json!({ "prefix": { DESCRIPTION_FIELD: text.to_lowercase() } }),
        json!({ "prefix": { DESCRIPTION_KEYWORD_FIELD: text } }),
        json!({
            "query_string": {
                "query": format!("{}*", escape_query_string(text)),
                "fields": [DESCRIPTION_FIELD],
                "default_operator": "and",
                "lenient": true
            }
        }),
        any_of(vec![
            json!({ "wildcard": { DESCRIPTION_FIELD: { "value": contains, "case_insensitive": true } } }),
            json!({ "wildcard": { DESCRIPTION_KEYWORD_FIELD: { "value": contains, "case_insensitive": true } } }),
        ]),
    ];

    vec![Clause::must(any_of(strategies))]
}

fn free_text_clauses(filters: &FilterSet) -> Vec<Clause> {
    let Some(text) = present(&filters.q) else {
        return Vec::new();
    };
    vec![Clause::must(json!({
        "simple_query_string": {
            "query": text,
            "default_operator": "and",
            "lenient": true,
            "fields": FREE_TEXT_FIELDS
        }
    }))]
}

pub fn escape_query_string(raw: &str) -> String {
    QUERY_STRING_SPECIAL.replace_all(raw, r"\$0").into_owned()
}

fn any_of(clauses: Vec<Value>) -> Value {
    json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
}

fn term_clause(field: &str, value: &str) -> Value {
    json!({ "term": { field: value } })
}

fn match_clause(field: &str, value: &str) -> Value {
    json!({ "match": { field: value } })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters() -> FilterSet {
        FilterSet::default()
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn no_filters_match_everything() {
        let body = synthesize(&filters());
        assert!(structured_query(&filters()).is_empty());
        assert_eq!(body.query, json!({ "match_all": {} }));
        assert_eq!(body.sort, vec![json!({ "@timestamp": { "order": "desc" } })]);
        assert_eq!((body.from, body.size), (0, 50));
        assert!(body.track_total_hits);
    }

    #[test]
    fn blank_parameters_add_nothing() {
        let set = FilterSet {
            q: some("  "),
            desc: some(""),
            agent_id: some(" "),
            rule_id: some(""),
            level_gte: some(""),
            start: some("not a date"),
            ..filters()
        };
        assert_eq!(synthesize(&set).query, json!({ "match_all": {} }));
    }

    #[test]
    fn short_description_uses_five_strategies() {
        let set = FilterSet {
            desc: some("PA"),
            page: some("1"),
            size: some("50"),
            ..filters()
        };
        let query = structured_query(&set);
        assert!(query.filter.is_empty());
        assert!(query.should.is_empty());
        assert_eq!(query.must.len(), 1);

        let wrapper = &query.must[0]["bool"];
        assert_eq!(wrapper["minimum_should_match"], json!(1));
        let strategies = wrapper["should"].as_array().unwrap();
        assert_eq!(strategies.len(), 5);
        assert_eq!(strategies[0]["multi_match"]["fuzziness"], json!("AUTO"));
        assert_eq!(strategies[0]["multi_match"]["fields"], json!(["rule.description^3"]));
        assert_eq!(strategies[1], json!({ "prefix": { "rule.description": "pa" } }));
        assert_eq!(strategies[2], json!({ "prefix": { "rule.description.keyword": "PA" } }));
        assert_eq!(strategies[3]["query_string"]["query"], json!("PA*"));
        assert_eq!(
            strategies[4]["bool"]["should"][1],
            json!({ "wildcard": { "rule.description.keyword": { "value": "*PA*", "case_insensitive": true } } })
        );

        let body = synthesize(&set);
        assert_eq!((body.from, body.size), (0, 50));
        assert!(body.query["bool"].get("filter").is_none());
    }

    #[test]
    fn query_string_special_characters_are_escaped() {
        let set = FilterSet {
            desc: some(r#"a+b-c=d&e|f<g>h!(i){j}[k]^l"m~n*o?p:q\r/s"#),
            ..filters()
        };
        let query = structured_query(&set);
        let literal = query.must[0]["bool"]["should"][3]["query_string"]["query"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(
            literal,
            r#"a\+b\-c\=d\&e\|f\<g\>h\!\(i\)\{j\}\[k\]\^l\"m\~n\*o\?p\:q\\r\/s*"#
        );
    }

    #[test]
    fn severity_bounds_are_independent() {
        let set = FilterSet {
            level_gte: some("8"),
            level_lte: some(""),
            ..filters()
        };
        let query = structured_query(&set);
        assert_eq!(query.filter, vec![json!({ "range": { "rule.level": { "gte": 8 } } })]);

        let set = FilterSet {
            level_gte: some("high"),
            level_lte: some("12"),
            ..filters()
        };
        let query = structured_query(&set);
        assert_eq!(query.filter, vec![json!({ "range": { "rule.level": { "lte": 12 } } })]);

        let set = FilterSet {
            level_gte: some("abc"),
            ..filters()
        };
        assert!(structured_query(&set).is_empty());
    }

    #[test]
    fn rule_id_becomes_required_or() {
        let set = FilterSet {
            rule_id: some("550"),
            ..filters()
        };
        let body = synthesize(&set);
        assert_eq!(
            body.query,
            json!({
                "bool": {
                    "should": [
                        { "term": { "rule.id": "550" } },
                        { "match": { "rule.id": "550" } }
                    ],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn identity_and_time_filters_keep_dimension_order() {
        let set = FilterSet {
            agent_id: some("001"),
            agent_name: some("web-01"),
            manager_name: some("wazuh-manager"),
            group: some("syscheck"),
            start: some("1700000000"),
            end: some("garbage"),
            q: some("sshd failure"),
            ..filters()
        };
        let query = structured_query(&set);
        assert_eq!(
            query.filter,
            vec![
                json!({ "range": { "@timestamp": { "gte": "2023-11-14T22:13:20.000Z" } } }),
                json!({ "term": { "agent.id": "001" } }),
                json!({ "match": { "agent.name": "web-01" } }),
                json!({ "match": { "manager.name": "wazuh-manager" } }),
                json!({ "match": { "rule.groups": "syscheck" } }),
            ]
        );
        assert_eq!(query.must.len(), 1);
        let free_text = &query.must[0]["simple_query_string"];
        assert_eq!(free_text["query"], json!("sshd failure"));
        assert_eq!(free_text["default_operator"], json!("and"));
        assert_eq!(free_text["lenient"], json!(true));
        assert_eq!(free_text["fields"].as_array().unwrap().len(), 9);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let set = FilterSet {
            q: some("login"),
            desc: some("ssh"),
            rule_id: some("5710"),
            level_gte: some("3"),
            level_lte: some("10"),
            start: some("2024-01-01"),
            end: some("1704153600000"),
            page: some("3"),
            size: some("20"),
            sort: some("asc"),
            ..filters()
        };
        let first = serde_json::to_string(&synthesize(&set)).unwrap();
        let second = serde_json::to_string(&synthesize(&set)).unwrap();
        assert_eq!(first, second);

        let body = synthesize(&set);
        assert_eq!((body.from, body.size), (40, 20));
        assert_eq!(body.sort, vec![json!({ "@timestamp": { "order": "asc" } })]);
    }

    #[test]
    fn syscheck_feed_targets_one_agent() {
        let body = syscheck_events("002");
        assert_eq!(
            body.query,
            json!({
                "bool": {
                    "must": [
                        { "match": { "rule.groups": "syscheck" } },
                        { "match": { "agent.id": "002" } }
                    ]
                }
            })
        );
        assert_eq!(body.size, 50);
    }
}
