//! Prompt construction
//!
//! Weaves previously asked queries and previously given replies into a single prompt for the
//! chat model, bounded by a character budget. Characters are Unicode scalar values.


/// Default prompt budget in characters.
///
/// One token is roughly four characters of English text, so this keeps a 4096-token context
/// window comfortably below its limit.
pub const DEFAULT_CHARACTER_LIMIT: usize = 16_000;

const PREAMBLE: &str = "Given the queries I have asked previously (in the previous section), \
and your replies (in the replied section), answer my new query.\n";
const QUERIES_HEADER: &str = "Previous section:\n";
const REPLIES_HEADER: &str = "\nReplied section:\n";
const NEW_QUERY_HEADER: &str = "\nNew query:\n";

/// Builds length-bounded prompts from retrieved context and a new query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    limit: usize,
}

impl Default for PromptBuilder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_CHARACTER_LIMIT)
    }
}

impl PromptBuilder {
    #[inline]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Character count of the template with both context blocks empty and no query
    #[inline]
    pub fn template_len() -> usize {
        [PREAMBLE, QUERIES_HEADER, REPLIES_HEADER, NEW_QUERY_HEADER]
            .iter()
            .map(|part| part.chars().count())
            .sum()
    }

    /// Assemble the prompt.
    ///
    /// `retrieved_queries` and `retrieved_replies` are ranked nearest first. They are walked in
    /// lock-step by rank: at each rank the query is tried, then the reply, and each is kept only
    /// if the whole prompt stays within the limit. A side stops at its first item that does not
    /// fit, so every block is a prefix of its ranking.
    ///
    /// The new query is always included verbatim; if it alone exceeds the limit the prompt
    /// carries no context and is longer than the limit.
    #[inline]
    pub fn build<Q, R>(&self, retrieved_queries: &[Q], retrieved_replies: &[R], new_query: &str) -> String
    where
        Q: AsRef<str>,
        R: AsRef<str>,
    {
        let mut used = Self::template_len() + new_query.chars().count();
        let mut queries_block = String::new();
        let mut replies_block = String::new();
        let mut queries_open = true;
        let mut replies_open = true;

        for rank in 0..retrieved_queries.len().max(retrieved_replies.len()) {
            let next_query = retrieved_queries.get(rank).filter(|_| queries_open);
            let next_reply = retrieved_replies.get(rank).filter(|_| replies_open);
            if next_query.is_none() && next_reply.is_none() {
                break;
            }

            if let Some(query) = next_query {
                queries_open = append_within(&mut queries_block, query.as_ref(), &mut used, self.limit);
            }
            if let Some(reply) = next_reply {
                replies_open = append_within(&mut replies_block, reply.as_ref(), &mut used, self.limit);
            }
        }

        let mut prompt = String::with_capacity(
            PREAMBLE.len()
                + QUERIES_HEADER.len()
                + queries_block.len()
                + REPLIES_HEADER.len()
                + replies_block.len()
                + NEW_QUERY_HEADER.len()
                + new_query.len(),
        );
        prompt.push_str(PREAMBLE);
        prompt.push_str(QUERIES_HEADER);
        prompt.push_str(&queries_block);
        prompt.push_str(REPLIES_HEADER);
        prompt.push_str(&replies_block);
        prompt.push_str(NEW_QUERY_HEADER);
        prompt.push_str(new_query);
        prompt
    }
}

/// Append `item` and its line break to `block` if that keeps `used` within `limit`
fn append_within(block: &mut String, item: &str, used: &mut usize, limit: usize) -> bool {
    let cost = item.chars().count() + 1;
    if *used + cost > limit {
        return false;
    }
    block.push_str(item);
    block.push('\n');
    *used += cost;
    true
}
