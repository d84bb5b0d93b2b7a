//! Prompt templates for the two generation steps

use leadgen_common::db::Lead;

/// Business facts the prompts are built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBrief {
    pub first_name: String,
    pub company_name: String,
    pub business_type: String,
    pub business_description: String,
    pub city: String,
}

impl From<&Lead> for GenerationBrief {
    fn from(lead: &Lead) -> Self {
        Self {
            first_name: lead.first_name.clone(),
            company_name: lead.company_name.clone(),
            business_type: lead.business_type.clone(),
            business_description: lead.business_description.clone(),
            city: lead.city.clone(),
        }
    }
}

/// Ask for `count` numbered, search-driven video titles
pub fn titles_prompt(brief: &GenerationBrief, count: usize) -> String {
    format!(
        "Act as a market research expert. Consider a {business_type} in {city} offering: \
{description}, along with the other core services a business of this type usually provides. \
List the top {count} questions prospective customers type into Google when they are ready to buy. \
Phrase each question as a compelling, SEO-optimized video title.\n\n\
Return only a numbered list of {count} titles, one per line, exactly like this:\n\
1. [Title]\n\
2. [Title]\n\
...\n\
{count}. [Title]",
        business_type = brief.business_type,
        city = brief.city,
        description = brief.business_description,
        count = count,
    )
}

/// Ask for one 1-2 minute spoken script for `title`
pub fn script_prompt(brief: &GenerationBrief, title: &str) -> String {
    format!(
        "You are an expert YouTube scriptwriter for {company}, a {business_type} in {city}. \
Write a high-quality video script of one to two minutes for the title: '{title}'.\n\n\
First, research the topic '{title}' and gather accurate, compelling and current information. \
Use it as the basis of the teaching points.\n\n\
Then write the script in these parts, in this order:\n\n\
Hook: open with two questions that speak to the viewer's problem and confirm they are in the right place, \
then promise what they will get from the video and preview the points it covers.\n\n\
Introduction: the presenter, {first_name} from {company}, introduces themselves and the topic \
and sets expectations for the video.\n\n\
Teaching segments: two or three short segments, each teaching one aspect of the topic \
in plain language with practical advice.\n\n\
Summary: briefly recap the teaching points.\n\n\
Call to action: close with a direct next step for the viewer: \
'For more advice on this, contact {company} today for a free consultation.'\n\n\
Return only the words the presenter will read aloud. Do not include headings, stage directions, \
notes or any other text; the script goes straight into a teleprompter.",
        company = brief.company_name,
        business_type = brief.business_type,
        city = brief.city,
        title = title,
        first_name = brief.first_name,
    )
}
