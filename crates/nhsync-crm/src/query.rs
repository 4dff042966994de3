//! Typed record lookups rendered to SOQL

/// Equality lookup on a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub object: String,
    pub field: String,
    pub value: String,
    /// Fields to return besides `Id`
    pub select: Vec<String>,
    pub limit: Option<u32>,
}

impl RecordQuery {
    /// `SELECT Id FROM {object} WHERE {field} = '{value}'`
    pub fn by_field(
        object: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            field: field.into(),
            value: value.into(),
            select: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !field.eq_ignore_ascii_case("Id") && !self.select.contains(&field) {
            self.select.push(field);
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_soql(&self) -> String {
        let mut columns = vec!["Id".to_string()];
        columns.extend(self.select.iter().cloned());

        let mut soql = format!(
            "SELECT {} FROM {} WHERE {} = '{}'",
            columns.join(", "),
            self.object,
            self.field,
            escape_soql_literal(&self.value)
        );
        if let Some(limit) = self.limit {
            soql.push_str(&format!(" LIMIT {limit}"));
        }
        soql
    }
}

/// Escape a value for use inside a single-quoted SOQL string literal.
pub fn escape_soql_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_field_soql() {
        let query = RecordQuery::by_field("Account", "CCN__c", "015009");
        assert_eq!(
            query.to_soql(),
            "SELECT Id FROM Account WHERE CCN__c = '015009'"
        );
    }

    #[test]
    fn test_select_and_limit() {
        let query = RecordQuery::by_field("Account", "CCN__c", "015009")
            .select("Name")
            .select("Id")
            .select("Name")
            .limit(1);
        assert_eq!(
            query.to_soql(),
            "SELECT Id, Name FROM Account WHERE CCN__c = '015009' LIMIT 1"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let query = RecordQuery::by_field("Account", "Name", "O'Brien \\ Sons");
        assert_eq!(
            query.to_soql(),
            "SELECT Id FROM Account WHERE Name = 'O\\'Brien \\\\ Sons'"
        );
    }

    #[test]
    fn test_injection_stays_inside_literal() {
        let escaped = escape_soql_literal("x' OR Name != '");
        assert_eq!(escaped, "x\\' OR Name != \\'");
    }
}
