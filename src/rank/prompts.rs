//! Prompt construction for both ranking stages.

use crate::llm::ChatMessage;

use super::CandidateProfile;

const EXTRACTION_SYSTEM: &str = "You are a recruiter.\n\
Return ONLY a valid JSON object.\n\
No explanations. No markdown.";

const TOURNAMENT_SYSTEM: &str = "You are a strict technical hiring manager \
evaluating candidates ONLY for the given job description.\n\n\
IMPORTANT RULES:\n\
- Strongly prioritize DEMONSTRATED, HANDS-ON experience.\n\
- Mentioning a skill WITHOUT real experience must be heavily penalized.\n\
- Candidates missing core JD requirements must receive LOW scores.\n\
- Use the FULL score range (0-100).\n\
- Large gaps are expected between strong and weak matches.\n\n\
Return ONLY valid JSON. No markdown. No explanations.";

/// Stage 1: structured extraction for a single candidate.
pub fn extraction_messages(job_description: &str, context: &str) -> Vec<ChatMessage> {
    let user = format!(
        "Job Description:\n{job_description}\n\n\
         Resume Context:\n{context}\n\n\
         Return JSON in this exact format:\n\
         {{\n\
         \"skills\": [\"<technical skills>\"],\n\
         \"experience\": [\"<specific experience>\"],\n\
         \"score\": 0.0,\n\
         \"reasoning\": \"<short reason>\"\n\
         }}"
    );

    vec![
        ChatMessage::system(EXTRACTION_SYSTEM),
        ChatMessage::user(user),
    ]
}

/// Stage 2: one comparative call over the whole candidate roster.
///
/// Each roster entry carries at most 5 skills and 2 experience items so
/// the roster stays inside the context window even with dozens of
/// candidates.
pub fn tournament_messages(
    job_description: &str,
    candidates: &[CandidateProfile],
) -> Vec<ChatMessage> {
    let roster = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let skills = if c.skills.is_empty() {
                "N/A".to_string()
            } else {
                c.skills
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let experience = if c.experience.is_empty() {
                "N/A".to_string()
            } else {
                c.experience
                    .iter()
                    .take(2)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            format!(
                "Candidate {}:\nFilename: {}\nSkills: {}\nExperience: {}",
                i + 1,
                c.filename,
                skills,
                experience
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let user = format!(
        "Job Description:\n{job_description}\n\n\
         Evaluation Criteria:\n\
         1. Demonstrated experience with the core requirements of the job description (MOST IMPORTANT)\n\
         2. Real-world projects, production systems, or long-term usage\n\
         3. Supporting and adjacent skills\n\
         4. Leadership or unrelated experience should NOT increase score\n\n\
         Candidates:\n{roster}\n\n\
         Return JSON in EXACT format:\n\
         {{\n\
         \"rankings\": [\n\
         {{\n\
         \"filename\": \"<filename>\",\n\
         \"skill_match\": 0-100,\n\
         \"experience_match\": 0-100,\n\
         \"final_score\": 0-100,\n\
         \"reason\": \"<1-2 sentence justification>\"\n\
         }}\n\
         ]\n\
         }}\n\n\
         Scoring Rules:\n\
         - If a core skill is only mentioned but NOT demonstrated, experience_match must be 40 or less\n\
         - If the core requirements are absent, final_score must be 30 or less\n\
         - Final score must reflect EXPERIENCE more than SKILLS\n\
         - Rank candidates from best to worst"
    );

    vec![
        ChatMessage::system(TOURNAMENT_SYSTEM),
        ChatMessage::user(user),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(filename: &str, skills: &[&str], experience: &[&str]) -> CandidateProfile {
        CandidateProfile {
            filename: filename.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience: experience.iter().map(|s| s.to_string()).collect(),
            score: 0.0,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_extraction_prompt_carries_jd_and_context() {
        let messages = extraction_messages("Rust engineer", "ten years of tokio");

        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("Rust engineer"));
        assert!(messages[1].content.contains("ten years of tokio"));
        assert!(messages[1].content.contains("\"reasoning\""));
    }

    #[test]
    fn test_tournament_roster_caps_and_placeholders() {
        let candidates = vec![
            profile(
                "a.pdf",
                &["s1", "s2", "s3", "s4", "s5", "s6", "s7"],
                &["e1", "e2", "e3"],
            ),
            profile("b.pdf", &[], &[]),
        ];
        let messages = tournament_messages("Rust engineer", &candidates);
        let user = &messages[1].content;

        assert!(user.contains("Candidate 1:\nFilename: a.pdf"));
        assert!(user.contains("s1, s2, s3, s4, s5"));
        assert!(!user.contains("s6"));
        assert!(user.contains("e1; e2"));
        assert!(!user.contains("e3"));
        assert!(user.contains("Candidate 2:\nFilename: b.pdf\nSkills: N/A\nExperience: N/A"));
        assert!(user.contains("Rust engineer"));
    }
}
