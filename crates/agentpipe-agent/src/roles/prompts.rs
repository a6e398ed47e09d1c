//! Prompt templates for each role.

use agentpipe_core::AgentRole;

pub(crate) fn architect(feature: &str) -> String {
    format!(
        r#"You are a senior software architect.
Produce an architecture plan for the feature below using exactly this layout:

# Architecture Plan

## Modules and Files
List at least three Python modules, one per line, each as:

- module_name.py: short description

## Dependencies Between Modules
- which module imports which, and why

## Key Classes and Functions
- module_name.py:
    - class ClassName: responsibilities
    - function_name(): purpose

## Suggested File Structure
A directory tree for the project.

Keep every module line in the `- module_name.py: description` form, starting
at the beginning of the line.

Feature:
{feature}
"#
    )
}

pub(crate) fn coder(feature: &str, memory_context: &str) -> String {
    let memory_context = if memory_context.is_empty() {
        "(no related code has been written yet)"
    } else {
        memory_context
    };
    format!(
        r#"You are a senior software engineer. Implement the feature below as a
single, complete Python module with docstrings and clear error handling.

Feature:
{feature}

Related code written earlier in this project:
{memory_context}

Return only the Python source code.
"#
    )
}

/// Prompt for a role that transforms an existing module.
pub(crate) fn from_source(role: AgentRole, module: &str, code: &str) -> String {
    let instructions = match role {
        AgentRole::Tester => {
            "You are a senior Python testing engineer. Write a pytest unit test \
             file for the module below. Cover normal inputs, edge cases such as \
             empty or None values, and failure paths. Return only Python code."
        }
        AgentRole::Qa => {
            "You are a software quality engineer. Review the module below and \
             write a Markdown report with sections for Summary, Readability and \
             Style, Documentation, Error Handling, Security, and Recommendations."
        }
        AgentRole::Refactorer => {
            "You are a senior Python engineer. Refactor the module below for \
             readability, maintainability, and performance without changing its \
             behavior. Return only the refactored Python code."
        }
        AgentRole::Documenter => {
            "You are a technical writer. Write a README.md for the module below \
             with a title, description, installation steps, usage examples, and \
             an API overview."
        }
        AgentRole::Architect | AgentRole::Coder => {
            "Review the module below and describe what it does."
        }
    };
    format!("{instructions}\n\nModule: {module}\n\n```python\n{code}\n```\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architect_prompt_names_required_sections() {
        let prompt = architect("CSV to Postgres loader");
        for header in [
            "## Modules and Files",
            "## Dependencies Between Modules",
            "## Key Classes and Functions",
            "## Suggested File Structure",
        ] {
            assert!(prompt.contains(header), "missing {header}");
        }
        assert!(prompt.contains("CSV to Postgres loader"));
    }

    #[test]
    fn test_coder_prompt_placeholder_when_no_context() {
        assert!(coder("x", "").contains("no related code"));
        assert!(coder("x", "def f(): pass").contains("def f(): pass"));
    }

    #[test]
    fn test_source_prompt_embeds_code() {
        let prompt = from_source(AgentRole::Qa, "loader.py", "x = 1");
        assert!(prompt.contains("loader.py"));
        assert!(prompt.contains("x = 1"));
        assert!(prompt.contains("report"));
    }
}
