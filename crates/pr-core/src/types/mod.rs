pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod review;

pub use enums::{PositionStatus, QuestionType, ReviewStatus, VersionAuthor};
pub use event::EventBody;
pub use ids::{CommentId, ReviewId};
pub use io::{
    AnswerInput, ApproveInput, AskQuestionsInput, CreateCommentInput, CreateReviewInput,
    QuestionInput, RollbackInput, UpdateCommentInput, UpdatePlanInput,
};
pub use review::{
    Comment, CommentQuestion, DocumentVersion, Review, ReviewSummary, TextPosition,
    VersionSummary,
};
