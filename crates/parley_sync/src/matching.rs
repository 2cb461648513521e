#![forbid(unsafe_code)]

//! Rules deciding which conversation thread a message belongs to.
//!
//! Two users can share several threads (one per job, one per application, one
//! direct). Scoping keys take priority over plain identity matching: the
//! application key is tried first, then the job key, then identity for
//! unscoped messages. Each step falls through to the next.

use parley_domain::{Conversation, Message, UserId};

/// Which rule matched a message to a conversation, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
	Application,
	Job,
	Direct,
}

/// The conversation's peer is the message's sender or receiver.
pub fn is_related(conv: &Conversation, msg: &Message, me: &UserId) -> bool {
	msg.involves(conv.peer_of(me))
}

/// Scope part of the rule, without the relatedness guard.
///
/// - the conversation's application id equals the message's application;
/// - else the conversation's job id equals the message's job;
/// - else the message is unscoped and the conversation's peer takes part in it.
pub fn context_tier(conv: &Conversation, msg: &Message, me: &UserId) -> Option<MatchTier> {
	if conv.application_id.is_some() && msg.application == conv.application_id {
		return Some(MatchTier::Application);
	}
	if conv.job_id.is_some() && msg.job == conv.job_id {
		return Some(MatchTier::Job);
	}
	(!msg.is_scoped() && msg.involves(conv.peer_of(me))).then_some(MatchTier::Direct)
}

/// Full match: scope rule plus the relatedness guard.
pub fn matches(conv: &Conversation, msg: &Message, me: &UserId) -> Option<MatchTier> {
	if !is_related(conv, msg, me) {
		return None;
	}
	context_tier(conv, msg, me)
}

/// Best match across `convs`: the most specific tier wins.
///
/// Among identity matches an unscoped conversation beats a scoped one; list
/// order breaks the remaining ties.
pub fn best_match<'a, I>(convs: I, msg: &Message, me: &UserId) -> Option<&'a Conversation>
where
	I: IntoIterator<Item = &'a Conversation>,
{
	let mut best: Option<((MatchTier, bool), &'a Conversation)> = None;
	for conv in convs {
		let Some(tier) = matches(conv, msg, me) else {
			continue;
		};
		let rank = (tier, !conv.scope().is_direct());
		if best.is_none_or(|(b, _)| rank < b) {
			best = Some((rank, conv));
		}
	}
	best.map(|(_, conv)| conv)
}
