//! The onboarding conversation.
//!
//! Every event re-reads the persisted [`Conversation`] for the chat user,
//! applies one transition under the per-user lock and writes it back.
//! Calls to the archive and the CRM field push run after the lock is
//! released.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::{self, Archive, DOCUMENTS_FOLDER};
use crate::crm::{map_stage, roadmap, CrmLinker, RoadmapStep};
use crate::locks::UserLocks;
use crate::models::{ClientCategory, Conversation, ConversationState, NewDocument, NewUser, User};
use crate::requirements::{self, RequiredDocument};
use crate::store::{Store, StoreError, StoreResult};

pub mod questions;
pub mod validate;

use questions::{question_text, FREE_TEXT_QUESTION, QUESTION_COUNT};
use validate::{normalize_phone, validate_full_name, NameError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Start,
    Text(String),
    Cancel,
    /// Restarts the interview at the first question.
    StartInterview,
    Document {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    /// Leaves document collection.
    Finish,
    Roadmap,
    ToggleConferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    AskName,
    InvalidName(NameError),
    AskPhone,
    InvalidPhone,
    CaseNotFound,
    RegistrationFailed,
    AlreadyRegistered {
        full_name: String,
    },
    Registered {
        full_name: String,
    },
    InterviewIntro,
    Question {
        number: u8,
        text: &'static str,
    },
    InterviewComplete {
        category: ClientCategory,
    },
    DocumentsRequired(Vec<RequiredDocument>),
    DocumentsUnderivable,
    AwaitingDocuments,
    DocumentSaved {
        file_name: String,
    },
    DocumentUploadFailed {
        file_name: String,
    },
    ArchiveUnavailable,
    NotCollectingDocuments,
    Completed {
        documents: usize,
    },
    Cancelled,
    MainMenu,
    NotRegistered,
    Roadmap {
        stage: Option<String>,
        description: &'static str,
        steps: Vec<RoadmapStep>,
    },
    ConferencesToggled {
        opted_out: bool,
    },
}

/// Work that talks to external services and runs without the user lock.
#[derive(Debug)]
enum Effect {
    CreateFolders {
        full_name: String,
        phone: String,
    },
    PushInterview {
        deal_id: i64,
        text: String,
    },
    UploadTranscript {
        folder_id: String,
        phone: String,
        answers: BTreeMap<u8, String>,
    },
    StoreDocument {
        folder_id: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Default)]
struct Step {
    replies: Vec<Reply>,
    effects: Vec<Effect>,
}

impl Step {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            effects: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct OnboardingMachine {
    store: Arc<dyn Store>,
    crm: Arc<dyn CrmLinker>,
    archive: Arc<dyn Archive>,
    locks: UserLocks,
    interview_field: Arc<str>,
    archive_root: Arc<str>,
}

impl OnboardingMachine {
    pub fn new(
        store: Arc<dyn Store>,
        crm: Arc<dyn CrmLinker>,
        archive: Arc<dyn Archive>,
        locks: UserLocks,
        interview_field: &str,
        archive_root: &str,
    ) -> Self {
        Self {
            store,
            crm,
            archive,
            locks,
            interview_field: interview_field.into(),
            archive_root: archive_root.into(),
        }
    }

    pub async fn handle(&self, chat_user_id: i64, event: ChatEvent) -> StoreResult<Vec<Reply>> {
        let step = {
            let _guard = self.locks.acquire(chat_user_id).await;
            self.step(chat_user_id, event).await?
        };

        let mut replies = step.replies;
        for effect in step.effects {
            replies.extend(self.run_effect(chat_user_id, effect).await?);
        }
        Ok(replies)
    }

    async fn step(&self, chat_user_id: i64, event: ChatEvent) -> StoreResult<Step> {
        let user = self.store.get_user(chat_user_id).await?;
        let conversation = self.store.get_conversation(chat_user_id).await?;

        match event {
            ChatEvent::Start => self.start(chat_user_id, user).await,
            ChatEvent::Cancel => self.cancel(conversation).await,
            ChatEvent::StartInterview => match user {
                Some(_) => {
                    let conversation = Conversation::new(
                        chat_user_id,
                        ConversationState::Interviewing { question: 1 },
                    );
                    self.store.save_conversation(&conversation).await?;
                    info!(chat_user_id, "interview restarted");
                    Ok(Step {
                        replies: vec![Reply::InterviewIntro, ask_question(1)],
                        effects: Vec::new(),
                    })
                }
                None => Ok(Step::reply(Reply::NotRegistered)),
            },
            ChatEvent::Text(input) => {
                let Some(mut conversation) = conversation else {
                    return Ok(Step::reply(idle_reply(&user)));
                };
                match conversation.state {
                    ConversationState::AwaitingName => {
                        self.capture_name(&mut conversation, &input).await
                    }
                    ConversationState::AwaitingPhone => {
                        self.capture_phone(&mut conversation, user, &input).await
                    }
                    ConversationState::Interviewing { question } => match user {
                        Some(user) => {
                            self.record_answer(&mut conversation, &user, question, &input)
                                .await
                        }
                        None => Ok(Step::reply(Reply::NotRegistered)),
                    },
                    ConversationState::CollectingDocuments => {
                        Ok(Step::reply(Reply::AwaitingDocuments))
                    }
                    ConversationState::Complete | ConversationState::Cancelled => {
                        Ok(Step::reply(idle_reply(&user)))
                    }
                }
            }
            ChatEvent::Document {
                file_name,
                content_type,
                bytes,
            } => {
                let collecting = conversation
                    .is_some_and(|c| c.state == ConversationState::CollectingDocuments);
                let Some(user) = user.filter(|_| collecting) else {
                    return Ok(Step::reply(Reply::NotCollectingDocuments));
                };
                let Some(folder_id) = user.archive_folder_id else {
                    warn!(chat_user_id, "document received but client has no archive folder");
                    return Ok(Step::reply(Reply::ArchiveUnavailable));
                };
                Ok(Step {
                    replies: Vec::new(),
                    effects: vec![Effect::StoreDocument {
                        folder_id,
                        file_name,
                        content_type,
                        bytes,
                    }],
                })
            }
            ChatEvent::Finish => match conversation {
                Some(mut conversation)
                    if conversation.state == ConversationState::CollectingDocuments =>
                {
                    conversation.state = ConversationState::Complete;
                    self.store.save_conversation(&conversation).await?;
                    let documents = self.store.documents(chat_user_id).await?.len();
                    info!(chat_user_id, documents, "onboarding complete");
                    Ok(Step::reply(Reply::Completed { documents }))
                }
                _ => Ok(Step::reply(Reply::NotCollectingDocuments)),
            },
            ChatEvent::Roadmap => Ok(Step::reply(match user {
                Some(user) => roadmap_reply(&user),
                None => Reply::NotRegistered,
            })),
            ChatEvent::ToggleConferences => match user {
                Some(_) => {
                    let opted_out = self.store.toggle_conference_opt_out(chat_user_id).await?;
                    Ok(Step::reply(Reply::ConferencesToggled { opted_out }))
                }
                None => Ok(Step::reply(Reply::NotRegistered)),
            },
        }
    }

    async fn start(&self, chat_user_id: i64, user: Option<User>) -> StoreResult<Step> {
        if let Some(user) = user {
            info!(chat_user_id, "start from registered user");
            return Ok(Step::reply(Reply::AlreadyRegistered {
                full_name: user.full_name,
            }));
        }

        let conversation = Conversation::new(chat_user_id, ConversationState::AwaitingName);
        self.store.save_conversation(&conversation).await?;
        info!(chat_user_id, "registration started");
        Ok(Step::reply(Reply::AskName))
    }

    async fn cancel(&self, conversation: Option<Conversation>) -> StoreResult<Step> {
        match conversation {
            Some(mut conversation) if !conversation.state.is_terminal() => {
                info!(
                    chat_user_id = conversation.chat_user_id,
                    from = conversation.state.as_str(),
                    "conversation cancelled"
                );
                conversation.state = ConversationState::Cancelled;
                conversation.pending_full_name = None;
                self.store.save_conversation(&conversation).await?;
                Ok(Step::reply(Reply::Cancelled))
            }
            _ => Ok(Step::reply(Reply::MainMenu)),
        }
    }

    async fn capture_name(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> StoreResult<Step> {
        match validate_full_name(input) {
            Ok(full_name) => {
                conversation.state = ConversationState::AwaitingPhone;
                conversation.pending_full_name = Some(full_name);
                self.store.save_conversation(conversation).await?;
                Ok(Step::reply(Reply::AskPhone))
            }
            Err(err) => Ok(Step::reply(Reply::InvalidName(err))),
        }
    }

    async fn capture_phone(
        &self,
        conversation: &mut Conversation,
        user: Option<User>,
        input: &str,
    ) -> StoreResult<Step> {
        let chat_user_id = conversation.chat_user_id;
        if let Some(user) = user {
            return Ok(Step::reply(Reply::AlreadyRegistered {
                full_name: user.full_name,
            }));
        }

        let Ok(phone) = normalize_phone(input) else {
            return Ok(Step::reply(Reply::InvalidPhone));
        };
        let Some(full_name) = conversation.pending_full_name.clone() else {
            conversation.state = ConversationState::AwaitingName;
            self.store.save_conversation(conversation).await?;
            return Ok(Step::reply(Reply::AskName));
        };

        let Some(case) = self.crm.find_case(&phone).await else {
            info!(chat_user_id, "no CRM case for phone, registration cancelled");
            conversation.state = ConversationState::Cancelled;
            conversation.pending_full_name = None;
            self.store.save_conversation(conversation).await?;
            return Ok(Step::reply(Reply::CaseNotFound));
        };

        let new_user = NewUser {
            chat_user_id,
            full_name: full_name.clone(),
            phone_number: phone.clone(),
            crm_contact_id: Some(case.contact_id),
            crm_deal_id: Some(case.deal_id),
            current_stage: case.stage,
        };
        match self.store.create_user(new_user).await {
            Ok(_) => {}
            Err(err @ (StoreError::DuplicatePhone(_) | StoreError::DuplicateUser(_))) => {
                warn!(chat_user_id, error = %err, "registration rejected");
                conversation.state = ConversationState::Cancelled;
                conversation.pending_full_name = None;
                self.store.save_conversation(conversation).await?;
                return Ok(Step::reply(Reply::RegistrationFailed));
            }
            Err(err) => return Err(err),
        }
        info!(chat_user_id, deal_id = case.deal_id, "client registered");

        conversation.state = ConversationState::Interviewing { question: 1 };
        conversation.pending_full_name = None;
        self.store.save_conversation(conversation).await?;

        Ok(Step {
            replies: vec![
                Reply::Registered {
                    full_name: full_name.clone(),
                },
                Reply::InterviewIntro,
                ask_question(1),
            ],
            effects: vec![Effect::CreateFolders { full_name, phone }],
        })
    }

    async fn record_answer(
        &self,
        conversation: &mut Conversation,
        user: &User,
        question: u8,
        input: &str,
    ) -> StoreResult<Step> {
        let chat_user_id = user.chat_user_id;
        let answer = input.trim();
        self.store
            .upsert_answer(chat_user_id, question, answer)
            .await?;

        if question < QUESTION_COUNT {
            conversation.state = ConversationState::Interviewing {
                question: question + 1,
            };
            self.store.save_conversation(conversation).await?;
            return Ok(Step::reply(ask_question(question + 1)));
        }

        let mut effects = Vec::new();
        if question == FREE_TEXT_QUESTION {
            if let Some(deal_id) = user.crm_deal_id {
                effects.push(Effect::PushInterview {
                    deal_id,
                    text: answer.to_string(),
                });
            }
        }

        let answers = self.store.answers(chat_user_id).await?;
        let resolution = requirements::resolve(&answers);
        self.store
            .set_category(chat_user_id, resolution.category)
            .await?;
        conversation.state = ConversationState::CollectingDocuments;
        self.store.save_conversation(conversation).await?;
        info!(
            chat_user_id,
            category = %resolution.category,
            documents = resolution.documents.len(),
            "interview complete"
        );

        if let Some(folder_id) = user.archive_folder_id.clone() {
            effects.push(Effect::UploadTranscript {
                folder_id,
                phone: user.phone_number.clone(),
                answers,
            });
        }

        let documents = if resolution.documents.is_empty() {
            Reply::DocumentsUnderivable
        } else {
            Reply::DocumentsRequired(resolution.documents)
        };
        Ok(Step {
            replies: vec![
                Reply::InterviewComplete {
                    category: resolution.category,
                },
                documents,
            ],
            effects,
        })
    }

    async fn run_effect(&self, chat_user_id: i64, effect: Effect) -> StoreResult<Vec<Reply>> {
        match effect {
            Effect::CreateFolders { full_name, phone } => {
                let folder = archive::create_client_folders(
                    self.archive.as_ref(),
                    &self.archive_root,
                    &full_name,
                    &phone,
                )
                .await;
                let Some(folder_id) = folder else {
                    warn!(chat_user_id, "continuing without an archive folder");
                    return Ok(Vec::new());
                };
                let _guard = self.locks.acquire(chat_user_id).await;
                if let Err(err) = self.store.set_archive_folder(chat_user_id, &folder_id).await {
                    warn!(chat_user_id, error = %err, "failed to record archive folder");
                }
                Ok(Vec::new())
            }
            Effect::PushInterview { deal_id, text } => {
                if !self
                    .crm
                    .update_field(deal_id, &self.interview_field, &text)
                    .await
                {
                    warn!(chat_user_id, deal_id, "interview summary not pushed to CRM");
                }
                Ok(Vec::new())
            }
            Effect::UploadTranscript {
                folder_id,
                phone,
                answers,
            } => {
                let content = archive::transcript(&answers, &phone);
                let name = archive::transcript_file_name(&phone);
                if self
                    .archive
                    .upload_file(
                        content.into_bytes(),
                        &name,
                        &folder_id,
                        Some("text/plain; charset=utf-8"),
                    )
                    .await
                    .is_none()
                {
                    warn!(chat_user_id, "interview transcript not archived");
                }
                Ok(Vec::new())
            }
            Effect::StoreDocument {
                folder_id,
                file_name,
                content_type,
                bytes,
            } => {
                let target = self
                    .archive
                    .create_folder(DOCUMENTS_FOLDER, Some(&folder_id))
                    .await
                    .unwrap_or(folder_id);
                let Some(file_id) = self
                    .archive
                    .upload_file(bytes, &file_name, &target, content_type.as_deref())
                    .await
                else {
                    return Ok(vec![Reply::DocumentUploadFailed { file_name }]);
                };

                self.store
                    .add_document(NewDocument {
                        id: Uuid::new_v4(),
                        chat_user_id,
                        document_type: file_name.clone(),
                        file_name: file_name.clone(),
                        archive_file_id: Some(file_id),
                    })
                    .await?;
                info!(chat_user_id, file_name = %file_name, "document stored");
                Ok(vec![Reply::DocumentSaved { file_name }])
            }
        }
    }
}

fn ask_question(number: u8) -> Reply {
    Reply::Question {
        number,
        text: question_text(number).unwrap_or_default(),
    }
}

fn idle_reply(user: &Option<User>) -> Reply {
    match user {
        Some(_) => Reply::MainMenu,
        None => Reply::NotRegistered,
    }
}

fn roadmap_reply(user: &User) -> Reply {
    let code = user.current_stage.as_deref();
    let display = code.map(map_stage);
    Reply::Roadmap {
        stage: display.map(|display| display.label.to_string()),
        description: display.map_or("", |display| display.description),
        steps: roadmap(code),
    }
}
