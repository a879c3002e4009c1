//! Placeholder substitution for group description templates.
//!
//! Only a fixed set of listing fields can be referenced. `{{` and `}}` produce
//! literal braces, and placeholders outside the set are copied through as
//! written. A `{` without a closing brace or a lone `}` rejects the template.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("placeholder opened at byte {offset} is never closed")]
    Unterminated { offset: usize },
    #[error("unmatched '}}' at byte {offset}")]
    UnmatchedClose { offset: usize },
}

/// Field values available to a template, already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues {
    pub group: String,
    pub rooms: String,
    pub area: String,
    pub floor: String,
    pub floors: String,
    pub price: String,
}

impl TemplateValues {
    fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "group" | "jk_name" => &self.group,
            "rooms" => &self.rooms,
            "area" | "square" => &self.area,
            "floor" => &self.floor,
            "floors" => &self.floors,
            "price" => &self.price,
            _ => return None,
        };
        Some(value.as_str())
    }
}

pub fn render(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                rendered.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                rendered.push('}');
            }
            '{' => {
                let body = &template[offset + 1..];
                let close = body
                    .find('}')
                    .ok_or(TemplateError::Unterminated { offset })?;
                let name = &body[..close];
                match values.lookup(name) {
                    Some(value) => rendered.push_str(value),
                    None => rendered.push_str(&template[offset..offset + close + 2]),
                }

                let resume = offset + close + 2;
                while chars.next_if(|(index, _)| *index < resume).is_some() {}
            }
            '}' => return Err(TemplateError::UnmatchedClose { offset }),
            other => rendered.push(other),
        }
    }

    Ok(rendered)
}
