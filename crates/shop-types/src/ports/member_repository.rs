use async_trait::async_trait;

use super::repo_error::RepoError;
use crate::domain::ids::MemberId;
use crate::domain::member::Member;

#[async_trait]
pub trait MemberRepository: Send + Sync + 'static {
    /// Fails with [`RepoError::Conflict`] when the name is already taken.
    async fn save_member(&self, member: Member) -> Result<Member, RepoError>;
    async fn find_member(&self, id: MemberId) -> Result<Option<Member>, RepoError>;
    async fn find_members(&self) -> Result<Vec<Member>, RepoError>;
    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Member>, RepoError>;
    async fn rename_member(&self, id: MemberId, name: String)
        -> Result<Option<Member>, RepoError>;
}
