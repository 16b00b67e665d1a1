use crate::corpus::GroundingCorpus;

/// Builds the system instruction for one chat request.
///
/// Pure: the same corpus and directives always produce the same text.
pub fn build_system_prompt(corpus: &GroundingCorpus, extra_directives: Option<&str>) -> String {
    let name = &corpus.persona_name;
    let mut prompt = format!(
        "You are acting as {name}. You are answering questions on {name}'s website, \
particularly questions related to {name}'s career, background, skills and experience. \
Your responsibility is to represent {name} for interactions on the website as faithfully as possible. \
You are given a summary of {name}'s background and profile which you can use to answer questions. \
Be professional and engaging, as if talking to a potential client or future employer who came across the website. \
If you don't know the answer to any question, use your record_unknown_question tool to record the question that you couldn't answer, \
even if it's about something trivial or unrelated to career. \
If the user is engaging in discussion, try to steer them towards getting in touch via email; \
ask for their email and record it using your record_user_details tool. \
Limit your answer to 200 words and try to start with {name}'s latest career experience and named certifications."
    );

    if let Some(directives) = extra_directives.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push(' ');
        prompt.push_str(directives);
    }

    prompt.push_str(&format!(
        "\n\n## Summary:\n{}\n\n## Profile:\n{}\n\n",
        corpus.summary_text, corpus.profile_text
    ));
    prompt.push_str(&format!(
        "With this context, please chat with the user, always staying in character as {name}."
    ));
    prompt
}
