use std::sync::Arc;

use crate::errors::AppError;
use shop_types::domain::address::Address;
use shop_types::domain::ids::MemberId;
use shop_types::domain::member::Member;
use shop_types::ports::MemberRepository;

pub struct MemberService<R: MemberRepository> {
    repo: Arc<R>,
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn join(&self, name: String, address: Address) -> Result<Member, AppError> {
        let member = Member::new(name, address)?;
        if !self.repo.find_members_by_name(&member.name).await?.is_empty() {
            return Err(AppError::Conflict(format!(
                "member name {:?} already exists",
                member.name
            )));
        }
        let member = self.repo.save_member(member).await?;
        tracing::info!(member_id = %member.id, name = %member.name, "member joined");
        Ok(member)
    }

    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        Ok(self.repo.find_members().await?)
    }

    pub async fn get_member(&self, id: MemberId) -> Result<Member, AppError> {
        self.repo
            .find_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("member {id}")))
    }

    pub async fn rename(&self, id: MemberId, name: String) -> Result<Member, AppError> {
        let member = self
            .repo
            .rename_member(id, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("member {id}")))?;
        tracing::info!(member_id = %id, name = %member.name, "member renamed");
        Ok(member)
    }
}
