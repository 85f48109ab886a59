use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Python,
    Java,
    Frontend,
    ItDeveloper,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Python => "🐍 Python разработчик",
            Category::Java => "☕ Java разработчик",
            Category::Frontend => "🎨 Frontend разработчик",
            Category::ItDeveloper => "💻 IT-разработчик",
        }
    }

    /// Name used in distribution lines of the report.
    pub fn short_name(&self) -> &'static str {
        match self {
            Category::Python => "Python",
            Category::Java => "Java",
            Category::Frontend => "Frontend",
            Category::ItDeveloper => "IT",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Order matters: the java rule must reject javascript, and framework names
// must win before the bare "js" test.
pub fn classify(title: &str, requirement: &str, responsibility: &str) -> Category {
    let text = format!("{} {} {}", title, requirement, responsibility).to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("python") {
        Category::Python
    } else if has("java") && !has("javascript") && !has("js") {
        Category::Java
    } else if has("frontend") || has("react") || has("angular") || has("vue") {
        Category::Frontend
    } else if has("javascript") || has("js") {
        Category::Frontend
    } else {
        Category::ItDeveloper
    }
}
